use std::env;

use anyhow::{Context as _, Result};
use aya_build::Toolchain;

fn main() -> Result<()> {
    let toolchain = match env::var("RUST_TOOLCHAIN") {
        Ok(toolchain) => Toolchain::Custom(toolchain),
        Err(_) => Toolchain::default(),
    };
    let cargo_metadata::Metadata { packages, .. } = cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("MetadataCommand::exec")?;
    let ebpf_package = packages
        .into_iter()
        .find(|cargo_metadata::Package { name, .. }| name == "binder-trace-ebpf")
        .context("binder-trace-ebpf package not found")?;
    aya_build::build_ebpf([ebpf_package], toolchain)
}
