//! deckdebuild backend

use super::{exec_passthrough, BuildOptions, PackageBuilder};
use crate::error::PoolResult;
use std::path::Path;
use tracing::info;

/// `PackageBuilder` running deckdebuild from inside the source tree
pub struct DeckDebuild {
    program: String,
    extra_args: Vec<String>,
}

impl DeckDebuild {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    fn args(&self, buildroot: &Path, output_dir: &Path, options: BuildOptions) -> Vec<String> {
        let mut args = Vec::new();
        if options.preserve {
            args.push("--preserve-build".to_string());
        }
        if options.build_source {
            args.push("--build-source".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(buildroot.to_string_lossy().into_owned());
        args.push(output_dir.to_string_lossy().into_owned());
        args
    }
}

impl PackageBuilder for DeckDebuild {
    fn build(
        &self,
        source_dir: &Path,
        buildroot: &Path,
        output_dir: &Path,
        options: BuildOptions,
    ) -> PoolResult<bool> {
        let args = self.args(buildroot, output_dir, options);
        info!("# {} {}", self.program, args.join(" "));

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        exec_passthrough(&self.program, &args, Some(source_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_order() {
        let builder = DeckDebuild::new("deckdebuild", vec!["--faketime".to_string()]);
        let args = builder.args(
            Path::new("/buildroot"),
            Path::new("/out"),
            BuildOptions {
                preserve: true,
                build_source: true,
            },
        );
        assert_eq!(
            args,
            vec!["--preserve-build", "--build-source", "--faketime", "/buildroot", "/out"]
        );
    }

    #[test]
    fn default_options_pass_only_paths() {
        let builder = DeckDebuild::new("deckdebuild", vec![]);
        let args = builder.args(Path::new("/r"), Path::new("/o"), BuildOptions::default());
        assert_eq!(args, vec!["/r", "/o"]);
    }
}
