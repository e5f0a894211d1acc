//! Distro command implementation

use anyhow::Result;
use hostns_namespace::HostEnvironment;

pub fn execute(env: &HostEnvironment) -> Result<()> {
    let distro = env.os_distro()?;
    println!("distro:  {distro}");
    println!("process: {}", env.default_process());
    Ok(())
}
