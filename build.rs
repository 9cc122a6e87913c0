use std::error::Error;

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn Error>> {
    EmitBuilder::builder()
        .build_date()
        .cargo_target_triple()
        .git_describe(true, true, None)
        .emit()?;
    Ok(())
}
