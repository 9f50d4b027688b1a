use crate::error::{MalltaxError, Result};
use crate::settings::{load_settings, save_settings, settings_file_exists, settings_path, shellexpand_path};

pub fn run(output_dir: Option<String>, force: bool) -> Result<()> {
    if settings_file_exists() && !force {
        return Err(MalltaxError::Settings(format!(
            "{} already exists\nRun `malltax init --force` to overwrite it.",
            settings_path().display()
        )));
    }

    let mut settings = load_settings();
    if let Some(dir) = output_dir {
        settings.output_dir = shellexpand_path(&dir);
    }
    std::fs::create_dir_all(&settings.output_dir)?;
    save_settings(&settings)?;

    println!("Settings:   {}", settings_path().display());
    println!("Output dir: {}", settings.output_dir);
    Ok(())
}
