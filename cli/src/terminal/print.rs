use colored::*;
use trafgen_common::Status;
use trafgen_core::RunSummary;

/// Prints the completion summary to stdout.
pub fn summary(summary: &RunSummary) {
    println!("Done. Output: {}", summary.output.display());
    if let Some(pcap) = &summary.pcap {
        println!("PCAP saved: {}", pcap.display());
    }
    println!("{}", breakdown(summary));
}

/// `3 samples: ok 2, error 1`, with a trailing note for interrupted runs.
pub fn breakdown(summary: &RunSummary) -> String {
    let counts: Vec<String> = summary
        .counts
        .iter()
        .map(|(status, n)| format!("{} {n}", paint(*status)))
        .collect();

    let mut line = format!("{} samples: {}", summary.rows, counts.join(", "));
    if summary.interrupted {
        line.push_str(&format!(" {}", "(interrupted)".yellow()));
    }
    line
}

fn paint(status: Status) -> ColoredString {
    let label = match status {
        Status::Unavailable => "unavailable",
        other => other.as_str(),
    };
    match status {
        Status::Ok | Status::OkReply => label.green(),
        Status::Sent => label.cyan(),
        Status::Lost | Status::NoReply => label.yellow(),
        Status::Error | Status::Unavailable | Status::Exception => label.red(),
    }
}
