use hera::{Connection, Result, query};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect_env().await?;
    conn.set_correlation_id("example-transaction");

    let stmt = conn.prepare("UPDATE hera_post SET name = ? WHERE id = ?");

    let mut tx = conn.begin()?;
    query(&stmt, &mut tx).bind("renamed").bind(1).execute().await?;
    tx.commit().await?;
    drop(tx);

    let mut tx = conn.begin()?;
    query(&stmt, &mut tx).bind("discarded").bind(2).execute().await?;
    tx.rollback().await?;
    drop(tx);

    // rolled back with the next request
    {
        let mut tx = conn.begin()?;
        query(&stmt, &mut tx).bind("dropped").bind(3).execute().await?;
    }

    let stmt = conn.prepare("SELECT name FROM hera_post WHERE id = ?");
    let name = query(&stmt, &mut conn).bind(3).fetch_all::<(String,)>().await?;
    assert_ne!(name[0].0, "dropped");

    Ok(())
}
