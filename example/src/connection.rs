use std::{env::var, time::Duration};
use hera::{Config, Connection, Result, Signal, query};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect(&var("HERA_URL").unwrap()).await?;
    let stmt = conn.prepare("SELECT 1 FROM dual");
    query(&stmt, &mut conn).fetch_all::<()>().await?;
    conn.close().await?;

    let mut conn = Connection::connect_env().await?;
    conn.set_client_info("example", "localhost").await?;
    println!("shards: {}", conn.get_num_shards().await?);
    conn.close().await?;

    let config = Config::from_env()
        .application_name("hera-example")
        .still_executing_backoff(Duration::from_millis(10));
    let mut conn = Connection::connect_with(&config).await?;

    // bound the whole operation, the connection is closed when it expires
    conn.watch(&Signal::timeout(Duration::from_secs(5)))?;
    let stmt = conn.prepare("SELECT 1 FROM dual");
    query(&stmt, &mut conn).fetch_all::<()>().await?;
    conn.finish();

    conn.close().await?;

    Ok(())
}
