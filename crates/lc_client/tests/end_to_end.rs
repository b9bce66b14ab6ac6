mod common;

use common::Net;
use lc_chain::{verify_records, LedgerError};
use lc_client::ClientError;
use lc_crypto::AccountKey;
use lc_proto::Call;

#[tokio::test]
async fn alice_and_bob_exchange_a_message() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let (a_addr, b_addr) = (ka.address(), kb.address());
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;

    let k_a = alice.messenger.keys().ensure_session_key().await.unwrap();
    let k_b = bob.messenger.keys().ensure_session_key().await.unwrap();
    assert_eq!(alice.messenger.profile(&a_addr).unwrap().session_public_key, Some(k_a));
    assert_eq!(bob.messenger.profile(&b_addr).unwrap().session_public_key, Some(k_b));

    let c = alice.messenger.open_conversation(&b_addr).await.unwrap();
    let index = alice.messenger.send(&b_addr, "hello").await.unwrap();
    assert_eq!(index, 0);

    let got = bob.messenger.read(&a_addr, 0, 10).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].index, 0);
    assert_eq!(got[0].sender_owner, a_addr);
    assert_eq!(got[0].text(), Some("hello"));

    // Bob's own create attempt conflicts; both sides still see C.
    let err = bob
        .messenger
        .wallet()
        .send(Call::CreateConversation { other: a_addr })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Ledger(LedgerError::Conflict(_))));
    assert_eq!(alice.messenger.conversation_id(&b_addr), Some(c));
    assert_eq!(bob.messenger.conversation_id(&a_addr), Some(c));

    // open_conversation from Bob resolves to the existing one.
    assert_eq!(bob.messenger.open_conversation(&a_addr).await.unwrap(), c);
}

#[tokio::test]
async fn missing_counterpart_key_is_distinct_from_empty() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let b_addr = kb.address();
    let a_addr = ka.address();
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    alice.messenger.keys().ensure_session_key().await.unwrap();

    let err = alice.messenger.read(&b_addr, 0, 10).await.unwrap_err();
    assert!(matches!(err, ClientError::NoSessionKey(addr) if addr == b_addr));
    let err = alice.messenger.send(&b_addr, "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::NoSessionKey(_)));

    bob.messenger.keys().ensure_session_key().await.unwrap();
    assert!(alice.messenger.read(&b_addr, 0, 10).await.unwrap().is_empty());
    assert!(bob.messenger.latest(&a_addr, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_local_key_reported() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let b_addr = kb.address();
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    bob.messenger.keys().ensure_session_key().await.unwrap();

    let err = alice.messenger.keys().encrypt_for(&b_addr, b"x").await.unwrap_err();
    assert!(matches!(err, ClientError::NoLocalSessionKey(_)));
}

#[tokio::test]
async fn tampered_record_cannot_decrypt() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let (a_addr, b_addr) = (ka.address(), kb.address());
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    alice.messenger.keys().ensure_session_key().await.unwrap();
    bob.messenger.keys().ensure_session_key().await.unwrap();
    alice.messenger.send(&b_addr, "intact").await.unwrap();

    let mut blob = net.chain.read(|s| {
        s.conversation_between(&a_addr, &b_addr).unwrap().get_message(0).unwrap().ciphertext.clone()
    });
    let plain = bob.messenger.keys().decrypt_from(&a_addr, &blob).await.unwrap();
    assert_eq!(plain.as_slice(), b"intact");
    for i in [0, 12, blob.len() - 1] {
        blob[i] ^= 0x01;
        let err = bob.messenger.keys().decrypt_from(&a_addr, &blob).await.unwrap_err();
        assert!(matches!(err, ClientError::CannotDecrypt));
        blob[i] ^= 0x01;
    }
}

#[tokio::test]
async fn plaintext_bound_enforced_before_posting() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let b_addr = kb.address();
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    alice.messenger.keys().ensure_session_key().await.unwrap();
    bob.messenger.keys().ensure_session_key().await.unwrap();

    let too_long = "x".repeat(1001);
    let err = alice.messenger.send(&b_addr, &too_long).await.unwrap_err();
    assert!(matches!(err, ClientError::Ledger(LedgerError::Validation(_))));
    assert_eq!(alice.messenger.send(&b_addr, &"x".repeat(1000)).await.unwrap(), 0);
}

#[tokio::test]
async fn rotation_orphans_old_messages() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let (a_addr, b_addr) = (ka.address(), kb.address());
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    let old = alice.messenger.keys().ensure_session_key().await.unwrap();
    bob.messenger.keys().ensure_session_key().await.unwrap();
    alice.messenger.send(&b_addr, "before").await.unwrap();

    let new = alice.messenger.keys().reinitialize_session_key().await.unwrap();
    assert_ne!(old, new);
    alice.messenger.send(&b_addr, "after").await.unwrap();

    let got = bob.messenger.read(&a_addr, 0, 10).await.unwrap();
    assert!(matches!(got[0].body, Err(ClientError::CannotDecrypt)));
    assert_eq!(got[1].text(), Some("after"));
}

#[tokio::test]
async fn fetched_history_matches_published_head() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let (a_addr, b_addr) = (ka.address(), kb.address());
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    alice.messenger.keys().ensure_session_key().await.unwrap();
    bob.messenger.keys().ensure_session_key().await.unwrap();
    for text in ["one", "two", "three"] {
        alice.messenger.send(&b_addr, text).await.unwrap();
    }
    bob.messenger.send(&a_addr, "four").await.unwrap();

    let (info, records) = net.chain.read(|s| {
        let c = s.conversation_between(&a_addr, &b_addr).unwrap();
        (c.info(), c.get_messages(0, u64::MAX))
    });
    assert_eq!(info.message_count, 4);
    verify_records(&info, &records).unwrap();
}

#[tokio::test]
async fn poller_delivers_counterpart_messages() {
    let (ka, kb) = (AccountKey::generate(), AccountKey::generate());
    let (a_addr, b_addr) = (ka.address(), kb.address());
    let mut net = Net::start(&[&ka, &kb]);
    let alice = net.join(ka, "Alice").await;
    let bob = net.join(kb, "Bob").await;
    alice.messenger.keys().ensure_session_key().await.unwrap();
    bob.messenger.keys().ensure_session_key().await.unwrap();
    alice.messenger.send(&b_addr, "already there").await.unwrap();

    let mut poller = bob
        .messenger
        .spawn_poller(a_addr, Some(std::time::Duration::from_millis(50)));
    bob.messenger.send(&a_addr, "my own").await.unwrap();
    alice.messenger.send(&b_addr, "new one").await.unwrap();

    let m = tokio::time::timeout(std::time::Duration::from_secs(5), poller.messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m.text(), Some("new one"));
    assert_eq!(m.sender_owner, a_addr);
    poller.shutdown().await;
}
