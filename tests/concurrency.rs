use std::sync::Arc;
use std::time::Duration;

use duplex_wire::config::ConnectionConfig;
use duplex_wire::protocol::{MessageFactory, SingleString};
use duplex_wire::Conn;
use tokio::task::JoinSet;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_senders_share_one_connection() {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let a = Arc::new(Conn::wrap(a, MessageFactory::global(), ConnectionConfig::default()));
    let b = Conn::wrap(b, MessageFactory::global(), ConnectionConfig::default());
    a.start().unwrap();
    b.start().unwrap();

    let senders = 8usize;
    let per_sender = 2_000usize;

    let mut tasks = JoinSet::new();
    for s in 0..senders {
        let a = a.clone();
        tasks.spawn(async move {
            for i in 0..per_sender {
                a.send_message(SingleString::new(format!("{s}:{i}")))
                    .await
                    .unwrap();
            }
        });
    }

    // per-sender order is preserved even though senders interleave
    let mut next = vec![0usize; senders];
    for _ in 0..senders * per_sender {
        let msg = timeout(Duration::from_secs(5), b.recv())
            .await
            .unwrap()
            .unwrap();
        let text = msg.downcast_ref::<SingleString>().unwrap().message().to_owned();
        let (s, i) = text.split_once(':').unwrap();
        let (s, i): (usize, usize) = (s.parse().unwrap(), i.parse().unwrap());
        assert_eq!(i, next[s], "sender {s} out of order");
        next[s] += 1;
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert!(next.iter().all(|&n| n == per_sender));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_is_safe() {
    let (a, _b) = tokio::io::duplex(1024);
    let a = Arc::new(Conn::wrap(a, MessageFactory::global(), ConnectionConfig::default()));
    a.start().unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..32 {
        let a = a.clone();
        tasks.spawn(async move { a.close() });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }
    assert!(a.is_closed());
    timeout(Duration::from_secs(1), a.closed()).await.unwrap();
}
