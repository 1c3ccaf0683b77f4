use anyhow::Result;

fn main() -> Result<()> {
    forest_sentinel::cli::run()
}
