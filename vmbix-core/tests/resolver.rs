mod common;

use common::{counter, resolver_for, small_inventory, CallCounts, MockConnector};
use std::sync::Arc;
use vmbix_core::cache::CacheView;
use vmbix_core::config::AddressingMode;
use vmbix_core::types::ObjectType;

#[tokio::test]
async fn test_identifier_lookup_warms_cache() {
    let connector = Arc::new(MockConnector::new(small_inventory()));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;

    let first = resolver.resolve("4201-bbbb", ObjectType::VirtualMachine).await.unwrap().unwrap();
    assert_eq!(first.object.name, "db01");
    let listings = CallCounts::get(&connector.calls.listings);

    let second = resolver.resolve("4201-bbbb", ObjectType::VirtualMachine).await.unwrap().unwrap();
    assert_eq!(second.object.reference, first.object.reference);

    // The second lookup never reached the endpoint.
    assert_eq!(CallCounts::get(&connector.calls.listings), listings);
    let stats = resolver.caches().vms.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_identifier_lookup_of_hosts() {
    let connector = Arc::new(MockConnector::new(small_inventory()));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;

    let host = resolver.resolve("4c4c-2222", ObjectType::Host).await.unwrap().unwrap();
    assert_eq!(host.object.name, "esx02");
    assert!(resolver.resolve("4c4c-9999", ObjectType::Host).await.unwrap().is_none());
    assert_eq!(resolver.supervisor().reconnect_attempts(), 0);
}

#[tokio::test]
async fn test_missing_name_is_not_cached_and_never_reconnects() {
    let connector = Arc::new(MockConnector::new(small_inventory()));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByName).await;

    assert!(resolver.resolve("ghost", ObjectType::VirtualMachine).await.unwrap().is_none());
    assert!(resolver.resolve("ghost", ObjectType::VirtualMachine).await.unwrap().is_none());

    assert_eq!(resolver.caches().vms.len(), 0);
    assert_eq!(CallCounts::get(&connector.calls.name_lookups), 2);
    assert_eq!(CallCounts::get(&connector.calls.connects), 1);
    assert_eq!(resolver.supervisor().reconnect_attempts(), 0);
}

#[tokio::test]
async fn test_name_lookup_caches_hits() {
    let connector = Arc::new(MockConnector::new(small_inventory()));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByName).await;

    for _ in 0..3 {
        let host = resolver.resolve("esx01", ObjectType::Host).await.unwrap().unwrap();
        assert_eq!(host.object.reference, "host-10");
    }
    assert_eq!(CallCounts::get(&connector.calls.name_lookups), 1);
    assert_eq!(resolver.caches().hosts.len(), 1);
}

#[tokio::test]
async fn test_empty_inventory_reconnects_once_and_retries() {
    let connector = Arc::new(MockConnector::new(small_inventory()).blind_for(1));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;
    let before = resolver.supervisor().current().generation;

    let vm = resolver.resolve("4201-aaaa", ObjectType::VirtualMachine).await.unwrap();
    assert_eq!(vm.unwrap().object.name, "web01");

    assert_eq!(resolver.supervisor().reconnect_attempts(), 1);
    assert_eq!(CallCounts::get(&connector.calls.connects), 2);
    assert_eq!(resolver.supervisor().current().generation, before + 1);
}

#[tokio::test]
async fn test_dead_session_gives_up_after_one_retry() {
    let connector = Arc::new(MockConnector::new(small_inventory()).blind_for(10));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;

    let found = resolver.resolve("4c4c-1111", ObjectType::Host).await.unwrap();
    assert!(found.is_none());
    assert_eq!(resolver.supervisor().reconnect_attempts(), 1);
    assert_eq!(CallCounts::get(&connector.calls.connects), 2);
}

#[tokio::test]
async fn test_reconnect_clears_caches() {
    let connector = Arc::new(MockConnector::new(small_inventory()).blind_for(1));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;
    resolver.caches().counters.insert("cpu.usage.average", counter(2, "cpu", "usage"));

    resolver.resolve("4201-aaaa", ObjectType::VirtualMachine).await.unwrap();

    assert_eq!(resolver.caches().counters.len(), 0);
    assert_eq!(resolver.caches().vms.len(), 1);
}

#[tokio::test]
async fn test_clusters_always_resolve_by_name() {
    let mut objects = small_inventory();
    objects.push((
        vmbix_core::ManagedObject::new(ObjectType::Cluster, "domain-c7", "prod"),
        serde_json::json!({}),
    ));
    let connector = Arc::new(MockConnector::new(objects));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByIdentifier).await;

    let cluster = resolver.resolve("prod", ObjectType::Cluster).await.unwrap().unwrap();
    assert_eq!(cluster.object.reference, "domain-c7");
    assert_eq!(CallCounts::get(&connector.calls.listings), 0);
}

#[tokio::test]
async fn test_counter_catalogue_loaded_once() {
    let connector = Arc::new(MockConnector::new(small_inventory()).with_counters(vec![
        counter(2, "cpu", "usage"),
        counter(24, "mem", "usage"),
        counter(125, "disk", "usage"),
    ]));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByName).await;

    let cpu = resolver.counter_by_name("cpu.usage.average").await.unwrap().unwrap();
    assert_eq!(cpu.key, 2);
    assert_eq!(resolver.caches().counters.len(), 3);

    let mem = resolver.counter_by_name("mem.usage.average").await.unwrap().unwrap();
    assert_eq!(mem.key, 24);
    assert_eq!(CallCounts::get(&connector.calls.catalogue_fetches), 1);
}

#[tokio::test]
async fn test_unknown_counter() {
    let connector = Arc::new(MockConnector::new(small_inventory()).with_counters(vec![counter(2, "cpu", "usage")]));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByName).await;

    assert!(resolver.counter_by_name("net.bogus.average").await.unwrap().is_none());
}

#[tokio::test]
async fn test_host_metric_ids_cached_by_name() {
    let connector = Arc::new(MockConnector::new(small_inventory()).with_counters(vec![counter(2, "cpu", "usage")]));
    let resolver = resolver_for(connector.clone(), AddressingMode::ByName).await;
    let host = resolver.resolve("esx01", ObjectType::Host).await.unwrap().unwrap();

    let ids = resolver.host_metric_ids(&host).await.unwrap();
    assert_eq!(ids.len(), 1);
    resolver.host_metric_ids(&host).await.unwrap();
    assert_eq!(CallCounts::get(&connector.calls.metric_id_queries), 1);

    let runtime = resolver.host_runtime(&host).await.unwrap();
    assert_eq!(runtime["powerState"], "poweredOn");
    assert_eq!(resolver.caches().host_runtime.len(), 1);
}
