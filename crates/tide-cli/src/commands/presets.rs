use tide_pool::Preset;

/// Print every preset as a loadable `[pool]` document.
pub fn print(size: usize) -> anyhow::Result<()> {
    for preset in Preset::ALL {
        let config = preset.config(Some(size))?;
        println!("# preset: {}", preset.name());
        println!("{}", config.to_toml_string()?);
    }
    Ok(())
}
