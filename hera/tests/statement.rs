use hera::{ErrorKind, Frame, query, query::StillExecutingPolicy};

mod common;
use common::*;

#[tokio::test]
async fn execute_sends_one_composite() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("select ?");

    let (res, request) = tokio::join!(query(&stmt, &mut conn).bind(42).execute(), async {
        let request = proxy.read().await;
        proxy.reply(&[value("1"), value("3")]).await;
        request
    });

    assert_eq!(res.unwrap().rows_affected, 3);
    assert_eq!(
        &request.serialized()[..],
        b"59:0 18:2006 CorrId=NotSet,13:25 select :p1,4:2 p1,4:3 42,1:4,,"
    );

    // correlation id is only attached once
    let (res, request) = tokio::join!(query(&stmt, &mut conn).bind("x").execute(), async {
        let request = proxy.read().await;
        proxy.reply(&[Frame::composite(&[value("0"), value("0")])]).await;
        request
    });

    assert_eq!(res.unwrap().rows_affected, 0);
    assert_eq!(
        children(&request),
        [
            (25, "select :p1".to_owned()),
            (2, "p1".to_owned()),
            (3, "x".to_owned()),
            (4, String::new()),
        ]
    );

    drop(conn);
    proxy.finish().await;
}

#[tokio::test]
async fn execute_named_with_session_state() {
    let (mut conn, mut proxy) = connect().await;
    conn.set_correlation_id("req-7");
    conn.set_shard_key_payload("id=12");

    let stmt = conn.prepare("update t set a = :a where b = :b");
    let (res, request) = tokio::join!(
        query(&stmt, &mut conn).bind_named("a", "foo").bind_named("b", 12).execute(),
        async {
            let request = proxy.read().await;
            proxy.reply(&[value("0"), value("1")]).await;
            request
        }
    );

    assert_eq!(res.unwrap().rows_affected, 1);
    assert_eq!(
        children(&request),
        [
            (2006, "CorrId=req-7".to_owned()),
            (25, "update t set a = :a where b = :b".to_owned()),
            (2, "a".to_owned()),
            (3, "foo".to_owned()),
            (2, "b".to_owned()),
            (3, "12".to_owned()),
            (27, "id=12".to_owned()),
            (4, String::new()),
        ]
    );

    conn.reset_shard_key_payload();
    let (res, request) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        let request = proxy.read().await;
        proxy.reply(&[value("0"), value("0")]).await;
        request
    });
    res.unwrap();
    assert!(children(&request).iter().all(|(cmd, _)| *cmd != 27));
}

#[tokio::test]
async fn execute_sql_error_reads_one_reply() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("selec 1");

    let (res, _) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        proxy.read().await;
        proxy.reply(&[Frame::new(SQL_ERROR, "bad syntax")]).await;
    });

    let err = res.unwrap_err();
    let ErrorKind::Sql(sql) = err.kind() else {
        panic!("expected sql error: {err}");
    };
    assert_eq!(sql.message(), "bad syntax");
    assert!(!err.is_fatal());

    // the connection is still in sync
    let (res, _) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        proxy.read().await;
        proxy.reply(&[Frame::new(ERROR, "proxy down")]).await;
    });
    let err = res.unwrap_err();
    let ErrorKind::Internal(internal) = err.kind() else {
        panic!("expected internal error: {err}");
    };
    assert_eq!(internal.message(), "proxy down");

    drop(conn);
    proxy.finish().await;
}

#[tokio::test]
async fn execute_unexpected_reply() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("delete from t");

    let (res, _) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        proxy.read().await;
        proxy.reply(&[Frame::new(OK, "huh")]).await;
    });

    let err = res.unwrap_err();
    let ErrorKind::Protocol(protocol) = err.kind() else {
        panic!("expected protocol error: {err}");
    };
    assert_eq!(protocol.code(), OK);
    assert_eq!(protocol.payload(), b"huh");
    assert!(err.is_fatal());

    let (res, _) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        proxy.read().await;
        proxy.reply(&[value("0"), value("many")]).await;
    });
    assert!(matches!(res.unwrap_err().kind(), ErrorKind::Protocol(_)));
}

#[tokio::test]
async fn execute_rejects_padded_row_count() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("delete from t");

    let (res, _) = tokio::join!(query(&stmt, &mut conn).execute(), async {
        proxy.read().await;
        proxy.reply(&[value("0"), value(" 3")]).await;
    });

    let err = res.unwrap_err();
    let ErrorKind::Protocol(protocol) = err.kind() else {
        panic!("expected protocol error: {err}");
    };
    assert_eq!(protocol.code(), VALUE);
    assert_eq!(protocol.payload(), b" 3");
}

#[tokio::test]
async fn unsupported_parameter_sends_nothing() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("insert into t values(?, ?)");

    let err = query(&stmt, &mut conn).bind(1).bind(2.5).execute().await.unwrap_err();
    let ErrorKind::UnsupportedParameter(unsupported) = err.kind() else {
        panic!("expected unsupported parameter: {err}");
    };
    assert_eq!(unsupported.position(), 2);
    assert_eq!(unsupported.type_name(), "float");

    // the pending correlation id is kept for the next statement
    let (res, request) = tokio::join!(query(&stmt, &mut conn).bind(1).bind("a").execute(), async {
        let request = proxy.read().await;
        proxy.reply(&[value("0"), value("1")]).await;
        request
    });
    res.unwrap();
    assert_eq!(children(&request)[0], (2006, "CorrId=NotSet".to_owned()));
}

#[tokio::test]
async fn fetch_pages_until_exhausted() {
    let (mut conn, mut proxy) = connect().await;
    let mut stmt = conn.prepare("select a, b from t");
    stmt.set_fetch_size(2);

    let (rows, request) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        let request = proxy.read().await;
        proxy
            .reply(&[
                value("2"),
                value("2"),
                value("a1"),
                value("b1"),
                value("a2"),
                value("b2"),
                no_more_data(),
            ])
            .await;
        request
    });

    assert_eq!(children(&request).last().unwrap(), &(7, "2".to_owned()));

    let mut rows = rows.unwrap();
    assert_eq!(rows.column_count(), 2);
    assert_eq!(rows.column_names(), ["", ""]);
    assert!(rows.is_exhausted());

    let first = rows.next_row().await.unwrap().unwrap();
    assert_eq!(first.try_get::<String>(0).unwrap(), "a1");
    assert_eq!(first.try_get::<String>(1).unwrap(), "b1");

    let second = rows.next_row().await.unwrap().unwrap();
    assert_eq!(second.decode::<(String, String)>().unwrap(), ("a2".to_owned(), "b2".to_owned()));

    assert!(rows.next_row().await.unwrap().is_none());
    assert!(rows.next_row().await.unwrap().is_none());
    assert!(matches!(rows.close().unwrap_err().kind(), ErrorKind::NotImplemented(_)));

    drop(conn);
    proxy.finish().await;
}

#[tokio::test]
async fn fetch_requests_next_page() {
    let (mut conn, mut proxy) = connect().await;
    let mut stmt = conn.prepare("select a from t");
    stmt.set_fetch_size(1);

    let (rows, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy.reply(&[value("1"), value("1"), value("x"), ok()]).await;
    });
    let mut rows = rows.unwrap();
    assert!(!rows.is_exhausted());

    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row.try_get::<String>(0).unwrap(), "x");

    let (row, fetch) = tokio::join!(rows.next_row(), async {
        let fetch = proxy.read().await;
        proxy.reply(&[value("y"), ok()]).await;
        fetch
    });
    assert_eq!(fetch, Frame::new(7, "1"));
    assert_eq!(row.unwrap().unwrap().try_get::<String>(0).unwrap(), "y");

    // an empty page ends the cursor
    let (row, fetch) = tokio::join!(rows.next_row(), async {
        let fetch = proxy.read().await;
        proxy.reply(&[no_more_data()]).await;
        fetch
    });
    assert_eq!(fetch.cmd(), 7);
    assert!(row.unwrap().is_none());
    assert!(rows.next_row().await.unwrap().is_none());

    drop(rows);
    drop(conn);
    proxy.finish().await;
}

#[tokio::test]
async fn fetch_into_buffer() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("select a, b from t");

    let (rows, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy.reply(&[value("2"), value("1"), value("1"), value("2"), value("3"), no_more_data()]).await;
    });
    let mut rows = rows.unwrap();

    let mut dest = vec![bytes::Bytes::new(); 2];
    assert!(rows.next_into(&mut dest).await.unwrap());
    assert_eq!(dest, [&b"1"[..], &b"2"[..]]);

    // a malformed page holds a partial row
    let err = rows.next_into(&mut dest).await.unwrap_err();
    let ErrorKind::CursorUnderflow(underflow) = err.kind() else {
        panic!("expected cursor underflow: {err}");
    };
    assert_eq!(underflow.available(), 1);
    assert_eq!(underflow.columns(), 2);
}

#[tokio::test]
async fn fetch_into_short_buffer_keeps_row() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("select a, b from t");

    let (rows, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy
            .reply(&[value("2"), value("2"), value("a1"), value("b1"), value("a2"), value("b2"), no_more_data()])
            .await;
    });
    let mut rows = rows.unwrap();

    let mut short = vec![bytes::Bytes::new(); 1];
    let err = rows.next_into(&mut short).await.unwrap_err();
    let ErrorKind::CursorUnderflow(underflow) = err.kind() else {
        panic!("expected cursor underflow: {err}");
    };
    assert_eq!(underflow.available(), 1);
    assert_eq!(underflow.columns(), 2);
    assert_eq!(short, [bytes::Bytes::new()]);

    let mut dest = vec![bytes::Bytes::new(); 2];
    assert!(rows.next_into(&mut dest).await.unwrap());
    assert_eq!(dest, [&b"a1"[..], &b"b1"[..]]);
    assert!(rows.next_into(&mut dest).await.unwrap());
    assert_eq!(dest, [&b"a2"[..], &b"b2"[..]]);
    assert!(!rows.next_into(&mut dest).await.unwrap());

    drop(rows);
    drop(conn);
    proxy.finish().await;
}

#[tokio::test]
async fn fetch_waits_while_still_executing() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("select name from t where id = ?");

    let (rows, _) = tokio::join!(query(&stmt, &mut conn).bind(1).fetch_all::<(String,)>(), async {
        proxy.read().await;
        proxy
            .reply(&[
                still_executing(),
                still_executing(),
                still_executing(),
                value("1"),
                value("1"),
                value("foo"),
                no_more_data(),
            ])
            .await;
    });

    assert_eq!(rows.unwrap(), [("foo".to_owned(),)]);
}

#[tokio::test]
async fn fetch_still_executing_limit() {
    let (mut conn, mut proxy) = connect().await;
    let mut stmt = conn.prepare("select 1");
    stmt.set_still_executing(StillExecutingPolicy::default().max_polls(1));

    let (res, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy.reply(&[still_executing(), still_executing()]).await;
    });

    let err = res.unwrap_err();
    let ErrorKind::StillExecuting(exceeded) = err.kind() else {
        panic!("expected still executing: {err}");
    };
    assert_eq!(exceeded.polls(), 2);
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn fetch_still_executing_backoff() {
    let config = hera::Config::new("localhost", 10101)
        .still_executing_backoff(std::time::Duration::from_secs(1));
    let (mut conn, mut proxy) = connect_with(config).await;
    let stmt = conn.prepare("select 1");

    let start = tokio::time::Instant::now();
    let (rows, _) = tokio::join!(query(&stmt, &mut conn).fetch_all::<(i64,)>(), async {
        proxy.read().await;
        proxy
            .reply(&[still_executing(), still_executing(), value("1"), value("1"), value("1"), no_more_data()])
            .await;
    });

    assert_eq!(rows.unwrap(), [(1,)]);
    assert!(start.elapsed() >= std::time::Duration::from_secs(2));
}

#[tokio::test]
async fn fetch_errors() {
    let (mut conn, mut proxy) = connect().await;
    let stmt = conn.prepare("select * from missing");

    let (res, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy.reply(&[still_executing(), Frame::new(SQL_ERROR, "no such table")]).await;
    });
    let err = res.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Sql(e) if e.message() == "no such table"));

    // value reply during page load is the only valid data reply
    let (res, _) = tokio::join!(query(&stmt, &mut conn).fetch(), async {
        proxy.read().await;
        proxy.reply(&[value("1"), value("1"), Frame::new(SQL_ERROR, "late")]).await;
    });
    let err = res.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol(e) if e.code() == SQL_ERROR));
}
