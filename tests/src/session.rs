mod integration;
mod safety;
