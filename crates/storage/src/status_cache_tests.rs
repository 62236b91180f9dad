// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn cache_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("task-status-cache.json");

    let cache = StatusCache::new(&path);
    let mut map = cache.load().unwrap();
    assert!(map.is_empty());

    map.insert("task-1".to_string(), TaskStatus::Approved);
    map.insert("task-2".to_string(), TaskStatus::InProgress);
    cache.save(&map).unwrap();

    let reloaded = StatusCache::new(&path).load().unwrap();
    assert_eq!(reloaded.get("task-1"), Some(&TaskStatus::Approved));
    assert_eq!(reloaded.get("task-2"), Some(&TaskStatus::InProgress));
}
