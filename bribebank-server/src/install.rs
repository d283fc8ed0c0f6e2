use std::fs;
use std::io::Write;
use std::path::Path;

use rand::Rng;
use rand::distr::Alphanumeric;
use tinytemplate::TinyTemplate;

const EXAMPLE_CONFIG: &str = include_str!("../config.yaml.example");
const UNIT_TEMPLATE: &str = include_str!("../systemd/bribebank-server.service");
const SECRET_PLACEHOLDER: &str = "change-this-to-a-long-random-secret";
const SECRET_LEN: usize = 48;

/// Where `install` puts things and who the service runs as.
pub struct InstallTarget<'a> {
    pub unit_path: &'a Path,
    pub config_path: &'a Path,
    pub db_path: &'a Path,
    pub binary_path: &'a Path,
    pub user: &'a str,
    pub group: &'a str,
    pub working_dir: &'a Path,
}

fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

fn render_default_config() -> String {
    EXAMPLE_CONFIG.replace(SECRET_PLACEHOLDER, &generate_secret())
}

#[derive(serde::Serialize)]
struct UnitCtx<'a> {
    binary_path: &'a str,
    config_path: &'a str,
    db_path: &'a str,
    user: &'a str,
    group: &'a str,
    working_dir: &'a str,
}

fn render_unit(ctx: &UnitCtx) -> Result<String, String> {
    let mut tt = TinyTemplate::new();
    tt.add_template("unit", UNIT_TEMPLATE)
        .map_err(|e| format!("template: {e}"))?;
    tt.render("unit", ctx).map_err(|e| format!("render: {e}"))
}

fn ensure_parent(path: &Path) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| format!("create dir {}: {}", dir.display(), e))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    let mut f = fs::File::create(path).map_err(|e| format!("write {}: {}", path.display(), e))?;
    f.write_all(contents.as_bytes())
        .map_err(|e| format!("write {}: {}", path.display(), e))
}

pub fn install_system(target: &InstallTarget<'_>, force: bool) -> Result<(), String> {
    ensure_parent(target.config_path)?;
    ensure_parent(target.unit_path)?;
    ensure_parent(target.db_path)?;

    if target.config_path.exists() && !force {
        eprintln!(
            "Config exists at {}; skipping (use --force to overwrite)",
            target.config_path.display()
        );
    } else {
        write_file(target.config_path, &render_default_config())?;
        // Holds the JWT secret
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(target.config_path, fs::Permissions::from_mode(0o640));
        }
        println!("Wrote config to {}", target.config_path.display());
    }

    if target.unit_path.exists() && !force {
        eprintln!(
            "Unit exists at {}; skipping (use --force to overwrite)",
            target.unit_path.display()
        );
    } else {
        let ctx = UnitCtx {
            binary_path: &target.binary_path.display().to_string(),
            config_path: &target.config_path.display().to_string(),
            db_path: &target.db_path.display().to_string(),
            user: target.user,
            group: target.group,
            working_dir: &target.working_dir.display().to_string(),
        };
        write_file(target.unit_path, &render_unit(&ctx)?)?;
        println!("Wrote unit to {}", target.unit_path.display());
    }

    println!(
        "Done. Run: sudo systemctl daemon-reload && sudo systemctl enable --now bribebank-server"
    );
    Ok(())
}

pub fn uninstall_system(
    unit_path: &Path,
    remove_config: bool,
    config_path: &Path,
) -> Result<(), String> {
    if unit_path.exists() {
        fs::remove_file(unit_path).map_err(|e| format!("remove {}: {}", unit_path.display(), e))?;
        println!("Removed unit {}", unit_path.display());
    } else {
        println!("Unit {} not found; skipping", unit_path.display());
    }
    if remove_config {
        if config_path.exists() {
            fs::remove_file(config_path)
                .map_err(|e| format!("remove {}: {}", config_path.display(), e))?;
            println!("Removed config {}", config_path.display());
        } else {
            println!("Config {} not found; skipping", config_path.display());
        }
    }
    println!("Run: sudo systemctl daemon-reload && sudo systemctl disable --now bribebank-server");
    Ok(())
}

