use super::Host;
use super::common::{config_path, data_dir};
use super::config::Config;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `package-quality.toml` in the data directory)
    #[arg(value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Directory holding the package and pending collections
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    let output = match &args.output {
        Some(path) => path.clone(),
        None => config_path(&data_dir(args.data_dir.as_ref())?),
    };

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn writes_into_data_dir_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let mut host = TestHost::new();

        init_config(
            &mut host,
            &InitArgs {
                output: None,
                data_dir: Some(dir.clone()),
            },
        )
        .unwrap();

        let written = std::fs::read_to_string(dir.join("package-quality.toml")).unwrap();
        assert!(written.contains("chunk_size"));
        assert!(host.output_str().contains("package-quality.toml"));
    }
}
