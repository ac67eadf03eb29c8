mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::{record, Fixture, ETH_ADDRESS_0, PHRASE};
use hdwallet_pool::crypto::envelope::SecretDecryptor;
use hdwallet_pool::security::SecretVec;
use hdwallet_pool::{DerivationAddressIdentity, PoolUnitHost, RangeRequestUnit, UnitContext, WalletError, WalletPoolUnit};

fn id(account: u32, change: u32, index: u32) -> DerivationAddressIdentity {
    DerivationAddressIdentity::new(account, change, index)
}

#[test_log::test(tokio::test)]
async fn test_first_operation_loads_lazily() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    assert!(!unit.is_loaded().await);
    assert_eq!(fx.decryptor.calls(), 0);

    let address = unit.get_address(id(0, 0, 0)).await.expect("address");
    assert_eq!(address, ETH_ADDRESS_0);
    assert!(unit.is_loaded().await);

    unit.get_address(id(0, 0, 1)).await.expect("address");
    assert_eq!(fx.decryptor.calls(), 1);
    assert_eq!(unit.cached_addresses().await, 2);
}

#[tokio::test]
async fn test_unknown_wallet_is_not_found() {
    let fx = Fixture::ethereum();
    let unit = WalletPoolUnit::new(Uuid::new_v4(), fx.mnemonic_uuid, fx.ctx.clone());
    assert!(matches!(unit.get_address(id(0, 0, 0)).await, Err(WalletError::WalletNotFound(_))));
    assert!(!unit.is_loaded().await);
}

#[tokio::test]
async fn test_mnemonic_uuid_mismatch_is_not_found() {
    let fx = Fixture::ethereum();
    let unit = WalletPoolUnit::new(fx.wallet_uuid, Uuid::new_v4(), fx.ctx.clone());
    assert!(matches!(unit.load().await, Err(WalletError::WalletNotFound(_))));
    assert_eq!(fx.decryptor.calls(), 0);
}

#[tokio::test]
async fn test_disabled_wallet_is_rejected() {
    let fx = Fixture::ethereum();
    fx.repository.set_enabled(fx.wallet_uuid, false).expect("disable");
    let err = fx.unit().load().await.unwrap_err();
    assert!(matches!(err, WalletError::WalletDisabled(_)));
}

#[tokio::test]
async fn test_hash_mismatch_aborts_load() {
    let fx = Fixture::ethereum();
    let wallet_uuid = Uuid::new_v4();
    let mut tampered = record(wallet_uuid, fx.mnemonic_uuid, PHRASE);
    tampered.mnemonic_hash = "00".repeat(32);
    fx.repository.insert(tampered);

    let unit = WalletPoolUnit::new(wallet_uuid, fx.mnemonic_uuid, fx.ctx.clone());
    let err = unit.get_address(id(0, 0, 0)).await.unwrap_err();
    assert!(matches!(err, WalletError::MnemonicIntegrityMismatch(_)));
    assert!(err.is_critical());
    assert!(!unit.is_loaded().await);
}

#[tokio::test]
async fn test_corrupt_blob_is_decryption_failure() {
    let fx = Fixture::ethereum();
    let wallet_uuid = Uuid::new_v4();
    let mut corrupt = record(wallet_uuid, fx.mnemonic_uuid, PHRASE);
    if let Some(last) = corrupt.encrypted_mnemonic.last_mut() {
        *last ^= 0xFF;
    }
    fx.repository.insert(corrupt);

    let unit = WalletPoolUnit::new(wallet_uuid, fx.mnemonic_uuid, fx.ctx.clone());
    assert!(matches!(unit.load().await, Err(WalletError::DecryptionFailed(_))));
}

struct UnavailableDecryptor;

#[async_trait]
impl SecretDecryptor for UnavailableDecryptor {
    async fn decrypt(&self, _encrypted: &[u8]) -> Result<SecretVec, WalletError> {
        Err(WalletError::StorageError("key service unreachable".into()))
    }
}

#[tokio::test]
async fn test_collaborator_errors_surface_as_decryption_failed() {
    let fx = Fixture::ethereum();
    let ctx = UnitContext { decryptor: Arc::new(UnavailableDecryptor), ..fx.ctx.clone() };
    let unit = WalletPoolUnit::new(fx.wallet_uuid, fx.mnemonic_uuid, ctx);
    let err = unit.load().await.unwrap_err();
    assert!(matches!(err, WalletError::DecryptionFailed(ref msg) if msg.contains("unreachable")));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_idle_timer_unloads() {
    let fx = Fixture::new("ethereum", Duration::from_secs(8));
    let unit = fx.unit();
    unit.get_address(id(0, 0, 0)).await.expect("address");

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(unit.is_loaded().await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!unit.is_loaded().await);
    assert_eq!(unit.cached_addresses().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_activity_extends_lifetime() {
    let fx = Fixture::new("ethereum", Duration::from_secs(8));
    let unit = fx.unit();
    unit.get_address(id(0, 0, 0)).await.expect("address");

    tokio::time::sleep(Duration::from_secs(5)).await;
    unit.get_address(id(0, 0, 1)).await.expect("address");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(unit.is_loaded().await, "deadline moved to t=13s");

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!unit.is_loaded().await);
}

#[tokio::test(start_paused = true)]
async fn test_reload_after_idle_unload() {
    let fx = Fixture::new("ethereum", Duration::from_secs(2));
    let unit = fx.unit();
    let first = unit.get_address(id(0, 0, 3)).await.expect("address");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!unit.is_loaded().await);

    let second = unit.get_address(id(0, 0, 3)).await.expect("address");
    assert_eq!(first, second);
    assert_eq!(fx.decryptor.calls(), 2);
}

#[tokio::test]
async fn test_explicit_unload_is_idempotent() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    unit.load().await.expect("load");
    assert!(unit.unload().await);
    assert!(!unit.unload().await);
    assert!(!unit.is_loaded().await);
}

#[tokio::test]
async fn test_range_preserves_order() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    let (count, accounts) = unit
        .get_address_range(&[RangeRequestUnit::new(0, 0, 0, 24)])
        .await
        .expect("range");
    assert_eq!(count, 25);
    let indices: Vec<u32> = accounts.iter().map(|a| a.parameters.address_index).collect();
    assert_eq!(indices, (0..=24).collect::<Vec<_>>());
    assert_eq!(accounts[0].address, ETH_ADDRESS_0);
}

#[tokio::test]
async fn test_invalid_range_is_input_error() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    let err = unit
        .get_address_range(&[RangeRequestUnit::new(0, 0, 10, 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidRange { from: 10, to: 2 }));
    assert_eq!(err.category(), hdwallet_pool::core::errors::ErrorCategory::Input);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_load() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    let tasks: Vec<_> = (0..16u32)
        .map(|i| {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move { unit.get_address(id(0, 0, i % 4)).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("join").expect("address");
    }
    assert_eq!(fx.decryptor.calls(), 1);
    assert_eq!(unit.cached_addresses().await, 4);
}

#[tokio::test]
async fn test_shutdown_unloads() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    unit.load().await.expect("load");
    unit.shutdown().await;
    assert!(!unit.is_loaded().await);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unit_never_reloads() {
    let fx = Fixture::new("ethereum", Duration::from_secs(2));
    let unit = fx.unit();
    unit.get_address(id(0, 0, 0)).await.expect("address");
    unit.shutdown().await;
    assert!(unit.is_closed().await);

    let err = unit.get_address(id(0, 0, 0)).await.unwrap_err();
    assert!(matches!(err, WalletError::UnitClosed(_)));
    assert_eq!(err.category(), hdwallet_pool::core::errors::ErrorCategory::State);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!unit.is_loaded().await);
    assert_eq!(fx.decryptor.calls(), 1);
}

#[tokio::test]
async fn test_range_derivation_leaves_runtime_free() {
    let fx = Fixture::ethereum();
    let unit = fx.unit();
    unit.load().await.expect("load");

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        })
    };
    let before = ticks.load(Ordering::SeqCst);
    let (count, _) = unit
        .get_address_range(&[RangeRequestUnit::new(0, 0, 0, 299)])
        .await
        .expect("range");
    let during = ticks.load(Ordering::SeqCst) - before;
    ticker.abort();

    assert_eq!(count, 300);
    assert!(during > 0, "other tasks must run while a range is derived");
}

#[tokio::test]
async fn test_xpub_export() {
    // m/44'/0'/0'
    let fx = Fixture::new("bitcoin", Duration::from_secs(8));
    let xpub = fx.unit().account_extended_public_key(0).await.expect("xpub");
    assert_eq!(
        xpub,
        "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj"
    );
}

#[tokio::test]
async fn test_host_keeps_one_unit_per_wallet() {
    let fx = Fixture::ethereum();
    let host = PoolUnitHost::new(fx.ctx.clone());
    let a = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    let b = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(host.len(), 1);

    assert!(matches!(
        host.get_or_create(fx.wallet_uuid, Uuid::new_v4()),
        Err(WalletError::WalletNotFound(_))
    ));
}

#[tokio::test]
async fn test_host_shutdown_unloads_every_unit() {
    let fx = Fixture::ethereum();
    let other_wallet = Uuid::new_v4();
    fx.repository.insert(record(other_wallet, fx.mnemonic_uuid, PHRASE));

    let host = PoolUnitHost::new(fx.ctx.clone());
    let first = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    let second = host.get_or_create(other_wallet, fx.mnemonic_uuid).expect("unit");
    first.load().await.expect("load");
    second.load().await.expect("load");

    host.shutdown().await;
    assert!(host.is_empty());
    assert!(!first.is_loaded().await);
    assert!(!second.is_loaded().await);
}

#[tokio::test]
async fn test_removed_unit_held_elsewhere_stays_closed() {
    let fx = Fixture::ethereum();
    let host = PoolUnitHost::new(fx.ctx.clone());
    let stale = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    assert!(host.remove(&fx.wallet_uuid).await);

    assert!(matches!(stale.get_address(id(0, 0, 0)).await, Err(WalletError::UnitClosed(_))));
    assert!(!stale.is_loaded().await);

    let fresh = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    assert!(!Arc::ptr_eq(&stale, &fresh));
    assert_eq!(fresh.get_address(id(0, 0, 0)).await.expect("address"), ETH_ADDRESS_0);
}

#[test]
fn test_host_outside_runtime_reports_error() {
    let fx = Fixture::ethereum();
    let host = PoolUnitHost::new(fx.ctx.clone());
    assert!(matches!(
        host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid),
        Err(WalletError::InternalError(_))
    ));
    assert!(host.is_empty());
}

#[tokio::test]
async fn test_host_remove() {
    let fx = Fixture::ethereum();
    let host = PoolUnitHost::new(fx.ctx.clone());
    let unit = host.get_or_create(fx.wallet_uuid, fx.mnemonic_uuid).expect("unit");
    unit.load().await.expect("load");
    assert!(host.remove(&fx.wallet_uuid).await);
    assert!(!host.remove(&fx.wallet_uuid).await);
    assert!(!unit.is_loaded().await);
    assert!(host.get(&fx.wallet_uuid).is_none());
}
