//! Binding cache unit tests against the simulated host

use super::*;
use crate::errors::ErrorKind;
use crate::host::SimHost;

fn cache() -> BindingCache<SimHost> {
    BindingCache::new(SimHost::initialized())
}

fn retaining_cache() -> BindingCache<SimHost> {
    let config = GchConfig {
        flag_policy: FlagPolicy::RetainAcrossTeardown,
        ..GchConfig::default()
    };
    BindingCache::with_config(SimHost::initialized(), &config)
}

#[test]
fn test_starts_empty() {
    let cache = cache();
    assert!(!cache.module_imported());
    for member in Member::ALL {
        assert_eq!(cache.state(member), SlotState::Unresolved);
    }
    assert_eq!(cache.cached_flag(GcFlag::DebugStats), None);
    assert_eq!(cache.stats(), CacheStats::default());
}

#[test]
fn test_module_import_is_lazy_and_unique() {
    let mut cache = cache();
    assert_eq!(cache.host().import_count(), 0);

    cache.ensure_module_imported().unwrap();
    cache.ensure_module_imported().unwrap();

    assert_eq!(cache.host().import_count(), 1);
    assert_eq!(cache.stats().module_imports, 1);
}

#[test]
fn test_member_resolution_imports_module_first() {
    let mut cache = cache();
    cache.ensure_member_imported(Member::Collect).unwrap();

    assert!(cache.module_imported());
    assert_eq!(cache.state(Member::Collect), SlotState::Resolved);
    assert_eq!(cache.state(Member::Enable), SlotState::Unresolved);
}

#[test]
fn test_resolve_into_external_slot() {
    let mut cache = cache();
    let mut slot = Slot::Unresolved;

    cache.resolve_into("enable", &mut slot).unwrap();
    let lookups = cache.host().lookup_count();
    cache.resolve_into("enable", &mut slot).unwrap();

    assert!(slot.is_resolved());
    assert_eq!(cache.host().lookup_count(), lookups);
}

#[test]
fn test_resolve_into_missing_member_leaves_slot_empty() {
    let mut cache = cache();
    let mut slot = Slot::Unresolved;

    let err = cache.resolve_into("get_referrers", &mut slot).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::MemberUnavailable { member: "get_referrers".to_string() }
    );
    assert!(!slot.is_resolved());
    assert_eq!(cache.last_error().unwrap().kind, "AttributeError");
}

#[test]
fn test_custom_module_name() {
    let config = GchConfig {
        module: "collector".to_string(),
        ..GchConfig::default()
    };
    let host = SimHost::with_module_name("collector");
    host.initialize();

    let mut cache = BindingCache::with_config(host, &config);
    assert_eq!(cache.module_name(), "collector");
    assert!(cache.isenabled().unwrap());
}

#[test]
fn test_calling_a_list_member_fails() {
    let mut cache = cache();
    // `garbage` is a list, not callable
    let err = cache.call_no_arg(Member::Garbage).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invocation { member: "garbage".to_string() });
    assert_eq!(cache.last_error().unwrap().kind, "TypeError");
    assert!(cache.host().calls().is_empty());
    assert_eq!(cache.host().import_count(), 0);
}

#[test]
fn test_temporary_results_are_released() {
    let mut cache = cache();

    cache.enable().unwrap();
    cache.disable().unwrap();
    cache.isenabled().unwrap();
    cache.collect(0).unwrap();
    cache.get_flag(GcFlag::DebugLeak).unwrap();
    assert_eq!(cache.host().release_count(), 5);

    // Cached flag values need no host object
    cache.get_flag(GcFlag::DebugLeak).unwrap();
    assert_eq!(cache.host().release_count(), 5);

    // Raw results belong to the caller
    let raw = cache.collect_raw(ALL_GENERATIONS).unwrap();
    assert_eq!(cache.host().release_count(), 5);
    drop(raw);
}

#[test]
fn test_negative_collect_count_is_reported() {
    let mut cache = cache();
    cache.host().set_collect_result(Some(-3));

    let err = cache.collect(0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conversion { member: "collect".to_string() });

    let detail = cache.last_error().unwrap();
    assert_eq!(detail.kind, "ValueError");
    assert!(detail.message.contains("-3"));
    assert_eq!(cache.host().release_count(), 1);
}

#[test]
fn test_collect_counts_and_stats() {
    let mut cache = cache();
    cache.host().seed_garbage(1, 5);

    assert_eq!(cache.collect(0).unwrap(), 0);
    assert_eq!(cache.collect(1).unwrap(), 5);
    assert_eq!(cache.collect_all().unwrap(), 0);
    assert_eq!(cache.stats().collections, 3);
}

#[test]
fn test_collect_invalid_generation_is_rejected_by_host() {
    let mut cache = cache();

    let err = cache.collect(7).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invocation { member: "collect".to_string() });
    assert_eq!(cache.last_error().unwrap().kind, "ValueError");
    assert_eq!(cache.stats().collections, 0);
}

#[test]
fn test_garbage_and_callbacks_are_cached() {
    let mut cache = cache();

    let first = cache.garbage().unwrap().clone();
    let lookups = cache.host().lookup_count();
    let second = cache.garbage().unwrap().clone();
    assert!(first.same_object(&second));
    assert_eq!(cache.host().lookup_count(), lookups);

    assert!(cache.callbacks().is_ok());
    assert_eq!(cache.state(Member::Callbacks), SlotState::Resolved);
}

#[test]
fn test_flag_values() {
    let mut cache = cache();
    assert_eq!(cache.get_flag(GcFlag::DebugStats).unwrap(), 1);
    assert_eq!(cache.get_flag(GcFlag::DebugCollectable).unwrap(), 2);
    assert_eq!(cache.get_flag(GcFlag::DebugUncollectable).unwrap(), 4);
    assert_eq!(cache.get_flag(GcFlag::DebugSaveall).unwrap(), 32);
    assert_eq!(cache.get_flag(GcFlag::DebugLeak).unwrap(), 38);
    assert_eq!(cache.stats().flag_decodes, 5);
}

#[test]
fn test_flag_zero_is_not_a_failure() {
    let mut cache = cache();
    cache.host().override_int("DEBUG_STATS", 0);

    assert_eq!(cache.get_flag(GcFlag::DebugStats), Ok(0));
    assert!(cache.last_error().is_none());
}

#[test]
fn test_flag_mask_wraps_negative_values() {
    let mut cache = cache();
    cache.host().override_int("DEBUG_SAVEALL", -2);

    assert_eq!(cache.get_flag(GcFlag::DebugSaveall).unwrap(), u64::MAX - 1);
}

#[test]
fn test_flags_do_not_populate_member_slots() {
    let mut cache = cache();
    cache.get_flag(GcFlag::DebugLeak).unwrap();

    for member in Member::ALL {
        assert_eq!(cache.state(member), SlotState::Unresolved);
    }
}

#[test]
fn test_invalidate_resets_flags_by_default() {
    let mut cache = cache();
    cache.get_flag(GcFlag::DebugLeak).unwrap();
    cache.enable().unwrap();

    cache.invalidate();

    assert!(!cache.module_imported());
    assert_eq!(cache.state(Member::Enable), SlotState::Unresolved);
    assert_eq!(cache.cached_flag(GcFlag::DebugLeak), None);
    assert_eq!(cache.stats().invalidations, 1);
}

#[test]
fn test_invalidate_can_retain_flags() {
    let mut cache = retaining_cache();
    cache.get_flag(GcFlag::DebugLeak).unwrap();

    cache.guarded_teardown().unwrap();

    assert!(!cache.module_imported());
    assert_eq!(cache.cached_flag(GcFlag::DebugLeak), Some(38));
    // Served from the cache even though the runtime is down
    assert_eq!(cache.get_flag(GcFlag::DebugLeak), Ok(38));
    assert_eq!(cache.host().import_count(), 1);
}

#[test]
fn test_teardown_failure_still_invalidates() {
    let mut cache = cache();
    cache.isenabled().unwrap();
    cache.host().set_fail_teardown(true);

    let err = cache.guarded_teardown().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Teardown { status: -1 });
    assert!(!cache.module_imported());
    assert_eq!(cache.state(Member::IsEnabled), SlotState::Unresolved);
}

#[test]
fn test_snapshot_json() {
    let mut cache = cache();
    cache.isenabled().unwrap();
    cache.get_flag(GcFlag::DebugStats).unwrap();

    let snapshot = cache.snapshot();
    assert_eq!(snapshot.module_state, SlotState::Resolved);
    assert_eq!(snapshot.members["isenabled"], SlotState::Resolved);
    assert_eq!(snapshot.members["collect"], SlotState::Unresolved);
    assert_eq!(snapshot.flags["DEBUG_STATS"], 1);

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
    assert_eq!(json["module"], "gc");
    assert_eq!(json["module_state"], "resolved");
    assert_eq!(json["flag_policy"], "reset_on_teardown");
    assert_eq!(json["stats"]["member_resolutions"], 1);
}
