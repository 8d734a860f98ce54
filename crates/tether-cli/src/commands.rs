//! CLI command implementations.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tether_core::{ToggleStatus, UserId, UserRecord};
use tether_graph::FollowStore;
use tether_reconciler::{Reconciler, ReconcilerConfig};
use tether_server::{FollowServer, ServerConfig};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// On-disk configuration, written by `init` and read by `serve` and
/// `reconcile`. Missing file or fields fall back to defaults.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoreConfig {
    version: String,
    reconcile_interval_secs: u64,
    reconcile_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            reconcile_interval_secs: 24 * 60 * 60,
            reconcile_page_size: 256,
        }
    }
}

fn tether_dir(path: &Path) -> PathBuf {
    path.join(".tether")
}

fn open_store(path: &Path) -> Result<Arc<FollowStore>> {
    Ok(Arc::new(FollowStore::open(tether_dir(path).join("db"))?))
}

fn load_config(path: &Path) -> StoreConfig {
    let config_path = tether_dir(path).join("config.json");
    fs::read_to_string(config_path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

fn reconciler_config(config: &StoreConfig) -> ReconcilerConfig {
    ReconcilerConfig {
        interval: Duration::from_secs(config.reconcile_interval_secs),
        page_size: config.reconcile_page_size,
    }
}

fn unix_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Initialize a store directory.
pub fn init(path: &Path) -> Result<()> {
    let dir = tether_dir(path);

    if dir.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    fs::create_dir_all(&dir)?;
    let config_path = dir.join("config.json");
    fs::write(
        &config_path,
        serde_json::to_string_pretty(&StoreConfig::default())?,
    )?;

    println!("{} Initialized Tether in {}", "✓".green(), path.display());
    println!(
        "  Run {} to start the server",
        "tether serve".cyan()
    );
    Ok(())
}

/// Create a user record and initialize its counters.
pub fn add_user(user: &str, path: &Path) -> Result<()> {
    let store = open_store(path)?;
    let id = UserId::parse(user)?;

    if store.user_exists(&id)? {
        println!("{} User {} already exists", "✓".green(), id.as_str().cyan());
        return Ok(());
    }

    store.put_user(&id, &UserRecord::new(unix_millis()))?;
    store.ensure_counters(&id)?;
    println!("{} Created user {}", "✓".green(), id.as_str().cyan());
    Ok(())
}

/// Toggle a follow edge on behalf of a user.
pub fn toggle(follower: &str, followed: &str, path: &Path) -> Result<()> {
    let store = open_store(path)?;
    let follower = UserId::parse(follower)?;
    let followed = UserId::parse(followed)?;

    match store.toggle(&follower, &followed)? {
        ToggleStatus::Followed => println!(
            "{} {} now follows {}",
            "✓".green(),
            follower.as_str().cyan(),
            followed.as_str().cyan()
        ),
        ToggleStatus::Unfollowed => println!(
            "{} {} no longer follows {}",
            "✓".green(),
            follower.as_str().cyan(),
            followed.as_str().cyan()
        ),
    }
    Ok(())
}

/// Print a user's counters.
pub fn stats(user: &str, path: &Path) -> Result<()> {
    let store = open_store(path)?;
    let id = UserId::parse(user)?;
    let stats = store.follow_stats(&id)?;

    println!("{}", id.as_str().cyan());
    println!("  followers: {}", stats.followers_count);
    println!("  following: {}", stats.following_count);
    Ok(())
}

/// Print pairwise follow state.
pub fn status(follower: &str, followed: &str, path: &Path) -> Result<()> {
    let store = open_store(path)?;
    let follower = UserId::parse(follower)?;
    let followed = UserId::parse(followed)?;

    match store.edge(&follower, &followed)? {
        Some(edge) => println!(
            "{} follows {} (since {} ms)",
            follower.as_str().cyan(),
            followed.as_str().cyan(),
            edge.created_at_ms
        ),
        None => println!(
            "{} does not follow {}",
            follower.as_str().cyan(),
            followed.as_str().cyan()
        ),
    }
    Ok(())
}

/// Run one reconciliation pass.
pub fn reconcile(path: &Path, json: bool) -> Result<()> {
    let store = open_store(path)?;
    let config = load_config(path);
    let job = Reconciler::new(store, reconciler_config(&config));
    let report = job.run_once()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Scanned {} users in {}ms",
        "✓".green(),
        report.users_scanned.to_string().cyan(),
        report.duration_ms
    );
    if report.users_corrected > 0 {
        println!(
            "{} Repaired drifted counters on {} users",
            "⚠".yellow(),
            report.users_corrected
        );
    }
    if report.users_failed > 0 {
        println!(
            "{} {} users failed and were skipped (see logs)",
            "⚠".yellow(),
            report.users_failed
        );
    }
    Ok(())
}

/// Start the server plus the reconciliation schedule.
pub async fn serve(port: u16, headless: bool, path: &Path) -> Result<()> {
    let bind_addr = if headless { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{bind_addr}:{port}").parse()?;

    let store = open_store(path)?;
    let config = load_config(path);

    let job = Reconciler::new(Arc::clone(&store), reconciler_config(&config));
    tokio::spawn(async move { job.run().await });

    println!(
        "{} Serving follow graph on {}",
        "✓".green(),
        format!("ws://{addr}").cyan()
    );

    let server = FollowServer::new(store, ServerConfig { addr });
    server.run().await?;
    Ok(())
}
