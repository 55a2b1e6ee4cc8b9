use dsjoin_core::{
    schema_of, CacheStore, Dataset, DatasetError, DatasourceError, DatasourceJoiner, DjDataset,
    JoinerConfig, JoinerError, LocalOverrideStorage, SqliteCacheStore,
};

fn config(main: &str, latency_ms: u64) -> JoinerConfig {
    let raw = format!(
        r#"{{
            "main_datasource": "{main}",
            "query_timeout_ms": 200,
            "datasources": [
                {{
                    "type": "memory",
                    "name": "ldap",
                    "schema": ["Nachname", "Vorname", "Mail"],
                    "latency_ms": {latency_ms},
                    "rows": [
                        {{ "key": "k1", "values": {{ "Nachname": "Meier", "Vorname": "Anna", "Mail": "anna@example.org" }} }},
                        {{ "key": "k2", "values": {{ "Nachname": "Meinhardt", "Vorname": "Bernd" }} }},
                        {{ "key": "k3", "values": {{ "Nachname": "Schulz", "Vorname": "Clara" }} }}
                    ]
                }},
                {{
                    "type": "memory",
                    "name": "overrides",
                    "schema": ["Nachname", "Vorname", "Mail"],
                    "rows": [
                        {{ "key": "k1", "values": {{ "Nachname": "Meyer", "Vorname": "Anna" }} }}
                    ]
                }},
                {{ "type": "prefer", "name": "personal", "source": "ldap", "over": "overrides" }}
            ]
        }}"#
    );
    JoinerConfig::from_json_str(&raw).unwrap()
}

fn joiner(main: &str) -> DatasourceJoiner {
    let cache = SqliteCacheStore::in_memory().unwrap();
    DatasourceJoiner::from_config(&config(main, 0), &cache).unwrap()
}

fn values_of(results: impl IntoIterator<Item = DjDataset>, column: &str) -> Vec<String> {
    results
        .into_iter()
        .map(|record| record.get(column).unwrap().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn find_searches_main_datasource_only() {
    let mut joiner = joiner("ldap");
    let local = joiner.new_dataset().unwrap();
    joiner.set(&local, "Nachname", "Meister").unwrap();

    let hits = joiner.find("Nachname", "Mei*").unwrap();

    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|record| !record.is_from_los()));
    assert_eq!(values_of(hits, "Nachname"), vec!["Meier", "Meinhardt"]);
}

#[test]
fn find2_requires_both_predicates() {
    let joiner = joiner("ldap");
    let hits = joiner.find2("Nachname", "Mei*", "Vorname", "*nn*").unwrap();
    assert_eq!(values_of(hits, "Vorname"), vec!["Anna"]);
}

#[test]
fn invalid_patterns_are_rejected() {
    let joiner = joiner("ldap");
    for pattern in ["", "*", "M*r"] {
        let err = joiner.find("Nachname", pattern).unwrap_err();
        assert!(
            matches!(err, JoinerError::InvalidPattern { .. }),
            "{pattern} should be rejected"
        );
    }
}

#[test]
fn copying_a_search_hit_creates_a_cached_record() {
    let mut joiner = joiner("ldap");
    let hit = joiner.find("Nachname", "Schulz").unwrap().into_vec().remove(0);

    let copy = joiner.copy(&hit).unwrap();

    assert!(copy.is_from_los());
    assert_eq!(copy.key(), hit.key());
    assert!(copy.has_backing_store());
    assert!(!copy.has_local_override("Vorname"));
    assert_eq!(copy.get("Vorname").unwrap(), Some("Clara"));
    assert!(joiner.is_selected(&copy));
    assert_eq!(joiner.get_los().len(), 1);
}

#[test]
fn mutating_a_foreign_record_is_unsupported() {
    let mut joiner = joiner("ldap");
    let hit = joiner.find("Nachname", "Meier").unwrap().into_vec().remove(0);

    let err = joiner.set(&hit, "Vorname", "Berta").unwrap_err();
    assert!(matches!(
        err,
        JoinerError::Dataset(DatasetError::UnsupportedOperation("set"))
    ));
    assert!(joiner.select(&hit).is_err());
    assert!(joiner.remove(&hit).is_err());
    joiner.discard_local_override(&hit, "Vorname").unwrap();
    assert!(joiner.get_los().is_empty());
}

#[test]
fn overrides_mask_and_discard_restores_backing_store() {
    let mut joiner = joiner("ldap");
    let hit = joiner.find("Nachname", "Meier").unwrap().into_vec().remove(0);
    let copy = joiner.copy(&hit).unwrap();

    let edited = joiner.set(&copy, "Nachname", "Meier-Lang").unwrap();
    assert!(edited.has_local_override("Nachname"));
    assert_eq!(edited.get("Nachname").unwrap(), Some("Meier-Lang"));

    joiner.discard_local_override(&edited, "Nachname").unwrap();
    let restored = joiner.selected_dataset().unwrap();
    assert!(!restored.has_local_override("Nachname"));
    assert_eq!(restored.get("Nachname").unwrap(), Some("Meier"));
}

#[test]
fn local_only_records_cannot_discard_overrides() {
    let mut joiner = joiner("ldap");
    let local = joiner.new_dataset().unwrap();

    assert!(local.has_local_override("Mail"));
    assert_eq!(local.get("Mail").unwrap(), Some("Mail"));
    let err = joiner.discard_local_override(&local, "Mail").unwrap_err();
    assert!(matches!(
        err,
        JoinerError::Dataset(DatasetError::NoBackingStore { .. })
    ));
}

#[test]
fn removing_the_selected_record_selects_the_first_remaining() {
    let mut joiner = joiner("ldap");
    let first = joiner.new_dataset().unwrap();
    let second = joiner.new_dataset().unwrap();
    joiner.select(&second).unwrap();
    assert!(joiner.is_selected(&second));

    joiner.remove(&second).unwrap();
    assert!(joiner.is_selected(&first));

    joiner.remove(&first).unwrap();
    assert!(matches!(
        joiner.selected_dataset(),
        Err(JoinerError::Dataset(DatasetError::DatasetNotFound))
    ));
}

#[test]
fn prefer_datasource_masks_by_key() {
    let joiner = joiner("personal");
    let hits = joiner.find("Nachname", "Me*").unwrap();
    assert_eq!(values_of(hits, "Nachname"), vec!["Meyer", "Meinhardt"]);

    let all = joiner.contents_of("personal").unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn contents_of_unknown_datasource_fails() {
    let joiner = joiner("ldap");
    assert!(matches!(
        joiner.contents_of("missing"),
        Err(JoinerError::UnknownDatasource(name)) if name == "missing"
    ));
    assert_eq!(
        joiner.datasource_names(),
        vec!["ldap", "overrides", "personal"]
    );
}

#[test]
fn startup_refresh_updates_cached_records() {
    let mut cache = SqliteCacheStore::in_memory().unwrap();
    {
        let mut joiner = DatasourceJoiner::from_config(&config("ldap", 0), &cache).unwrap();
        let hit = joiner.find("Nachname", "Meier").unwrap().into_vec().remove(0);
        let copy = joiner.copy(&hit).unwrap();
        joiner.set(&copy, "Vorname", "Annette").unwrap();
        joiner.save_cache(&mut cache).unwrap();
    }

    let joiner = DatasourceJoiner::from_config(&config("personal", 0), &cache).unwrap();

    let report = joiner.last_reconcile().unwrap();
    assert_eq!(report.refreshed.len(), 1);
    let selected = joiner.selected_dataset().unwrap();
    assert_eq!(selected.get("Nachname").unwrap(), Some("Meyer"));
    assert_eq!(selected.get("Vorname").unwrap(), Some("Annette"));
    assert_eq!(selected.get("Mail").unwrap(), None);
}

#[test]
fn startup_refresh_timeout_keeps_cached_state() {
    let mut cache = SqliteCacheStore::in_memory().unwrap();
    {
        let mut joiner = DatasourceJoiner::from_config(&config("ldap", 0), &cache).unwrap();
        let hit = joiner.find("Nachname", "Schulz").unwrap().into_vec().remove(0);
        joiner.copy(&hit).unwrap();
        joiner.save_cache(&mut cache).unwrap();
    }

    let mut joiner = DatasourceJoiner::from_config(&config("ldap", 1000), &cache).unwrap();

    assert!(!joiner.is_degraded());
    assert!(joiner.last_reconcile().is_none());
    assert_eq!(joiner.get_los().len(), 1);
    let err = joiner.refresh_los().unwrap_err();
    assert!(matches!(
        err,
        JoinerError::Datasource(DatasourceError::Timeout { .. })
    ));
    assert!(matches!(
        joiner.find("Nachname", "Schulz"),
        Err(JoinerError::Datasource(DatasourceError::Timeout { .. }))
    ));
}

#[test]
fn missing_main_with_cached_schema_runs_degraded() {
    let mut cache = SqliteCacheStore::in_memory().unwrap();
    let mut storage = LocalOverrideStorage::new(schema_of(["Nachname", "Vorname"]));
    let id = storage.new_dataset();
    storage.record_mut(id).unwrap().set("Nachname", "Offline").unwrap();
    cache.save(&storage.to_snapshot()).unwrap();

    let joiner = DatasourceJoiner::from_config(&config("archive", 0), &cache).unwrap();

    assert!(joiner.is_degraded());
    assert_eq!(joiner.main_datasource_name(), "archive");
    assert!(joiner.find("Nachname", "Off*").unwrap().is_empty());
    assert_eq!(
        joiner.selected_dataset().unwrap().get("Nachname").unwrap(),
        Some("Offline")
    );
}

#[test]
fn missing_main_without_cache_is_fatal() {
    let cache = SqliteCacheStore::in_memory().unwrap();
    let err = DatasourceJoiner::from_config(&config("archive", 0), &cache)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        JoinerError::NoUsableState { main_datasource } if main_datasource == "archive"
    ));
}

fn mixed_case_config(main: &str) -> JoinerConfig {
    let raw = format!(
        r#"{{
            "main_datasource": "{main}",
            "datasources": [
                {{
                    "type": "memory",
                    "name": "Personal",
                    "schema": ["Nachname", "Vorname"],
                    "rows": [{{ "key": "k1", "values": {{ "Nachname": "Meier" }} }}]
                }}
            ]
        }}"#
    );
    JoinerConfig::from_json_str(&raw).unwrap()
}

#[test]
fn mixed_case_main_datasource_is_used() {
    let cache = SqliteCacheStore::in_memory().unwrap();
    let joiner = DatasourceJoiner::from_config(&mixed_case_config("Personal"), &cache).unwrap();

    assert!(!joiner.is_degraded());
    assert_eq!(joiner.main_datasource_name(), "Personal");
    assert_eq!(joiner.datasource_names(), vec!["Personal"]);
    assert_eq!(joiner.find("Nachname", "Mei*").unwrap().len(), 1);
}

#[test]
fn mixed_case_missing_main_with_cache_runs_degraded() {
    let mut cache = SqliteCacheStore::in_memory().unwrap();
    let mut storage = LocalOverrideStorage::new(schema_of(["Nachname"]));
    storage.new_dataset();
    cache.save(&storage.to_snapshot()).unwrap();

    let joiner = DatasourceJoiner::from_config(&mixed_case_config("Archiv"), &cache).unwrap();

    assert!(joiner.is_degraded());
    assert_eq!(joiner.main_datasource_name(), "Archiv");
    assert_eq!(joiner.datasource_names(), vec!["Archiv", "Personal"]);
    assert_eq!(joiner.get_los().len(), 1);
}
