use futures::StreamExt;
use hera::{Connection, Result, query, types::Json};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect_env().await?;

    // Execute

    let stmt = conn.prepare("DELETE FROM hera_post");
    query(&stmt, &mut conn).execute().await?;

    let stmt = conn.prepare("INSERT INTO hera_post(id, name, meta) VALUES(?, ?, ?)");
    for id in 0..24 {
        let row = query(&stmt, &mut conn)
            .bind(id)
            .bind(format!("post{id}"))
            .bind(r#"{"tags":["a","b"]}"#)
            .execute()
            .await?;
        assert_eq!(row.rows_affected, 1);
    }

    // Queries

    let mut stmt = conn.prepare("SELECT id, name FROM hera_post WHERE id >= ? ORDER BY id");
    stmt.set_fetch_size(5);

    let posts = query(&stmt, &mut conn)
        .bind(0)
        .fetch_all::<(i64, String)>()
        .await?;

    assert_eq!(posts.len(), 24);
    assert_eq!(posts[23].1.as_str(), "post23");

    let mut rows = query(&stmt, &mut conn).bind(20).fetch().await?;

    while let Some(row) = rows.next().await {
        let (id, name) = row?.decode::<(i64, String)>()?;
        println!("{id}: {name}");
    }

    // named parameters

    let stmt = conn.prepare("SELECT meta FROM hera_post WHERE id = :id");
    let meta = query(&stmt, &mut conn)
        .bind_named("id", 3)
        .fetch_optional::<(Json<serde_json::Value>,)>()
        .await?;

    if let Some((Json(meta),)) = meta {
        println!("{meta}");
    }

    // shard routing

    conn.set_shard_id(0).await?;
    let stmt = conn.prepare("SELECT count(*) FROM hera_post");
    let count = query(&stmt, &mut conn).fetch_all::<(u64,)>().await?;
    println!("shard 0: {count:?}");
    conn.reset_shard_id().await?;

    conn.set_shard_key_payload("id=3");
    let stmt = conn.prepare("SELECT name FROM hera_post WHERE id = 3");
    query(&stmt, &mut conn).fetch_all::<(String,)>().await?;
    conn.reset_shard_key_payload();

    Ok(())
}
