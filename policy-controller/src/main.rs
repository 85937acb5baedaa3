#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod manifest;

fn main() -> anyhow::Result<()> {
    args::Args::parse_and_run()
}
