//! `pressroom init`

use console::style;

use crate::config::ConfigLoader;
use crate::types::Result;

pub fn run(force: bool) -> Result<()> {
    let project_dir = ConfigLoader::init_project(force)?;
    println!(
        "{} initialized at {}",
        style("pressroom").green().bold(),
        project_dir.display()
    );
    println!();
    println!("Next steps:");
    println!("  1. Put CMS credentials in .pressroom/credentials.env");
    println!("     (cms_admin_url, cms_username, cms_password)");
    println!("  2. Adjust .pressroom/selectors.toml to your CMS admin UI");
    println!("  3. Drop article HTML files into ./articles/");
    println!("  4. pressroom run");
    Ok(())
}
