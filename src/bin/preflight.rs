use crud_generator::infra::config;
use crud_generator::{
    ConfigStore, ConnectionManager, CrudService, CrudSettings, PgConfigStore, TableConfigRecord,
};
use std::sync::Arc;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--config <name>]\n\
         \n\
         Validates every active table configuration (or only <name>) against\n\
         its live connection: DDL parse, field references, dictionary sources.\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n\
         Optional:\n\
           CONFIG_PATH (directory holding db.json)\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let only = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(name) => Some(name.clone()),
            None => usage_and_exit(),
        },
        None => None,
    };

    let database_url = config::database_url()?;
    let configs = config::database_configs()?;

    println!("> Preflight:");
    println!("  CONFIG_PATH={}", config::config_path().display());
    let mut ids: Vec<&String> = configs.keys().collect();
    ids.sort();
    println!("  connections: {:?}", ids);

    let store = Arc::new(PgConfigStore::connect(&database_url).await?);
    let records: Vec<TableConfigRecord> = store
        .list_active()
        .await?
        .into_iter()
        .filter(|r| only.as_deref().map(|n| n == r.name).unwrap_or(true))
        .collect();
    if records.is_empty() {
        println!("  no active configurations to check");
        return Ok(());
    }

    let connections = Arc::new(ConnectionManager::new(configs));
    let crud = CrudService::new(store, connections, CrudSettings::from_env());

    let mut failed = 0usize;
    for record in &records {
        match crud.validate_record(record).await {
            Ok(cfg) => println!(
                "  OK    {} (table {}, v{}): {} display, {} search, {} creatable, {} updatable",
                record.name,
                cfg.table_name,
                record.version,
                cfg.display_fields.len(),
                cfg.search_fields.len(),
                cfg.creatable_fields.len(),
                cfg.updatable_fields.len()
            ),
            Err(e) => {
                failed += 1;
                println!("  FAIL  {} [{}]: {}", record.name, e.code(), e);
            }
        }
    }

    println!("> {} checked, {} failed", records.len(), failed);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
