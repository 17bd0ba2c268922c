use super::*;
use crate::buffer::sampler::EdgeMode;

fn chunk_buffer(seed: f32) -> MemoryBuffer {
    let rect = Rect::new(4, 4, 8, 6);
    let data = (0..rect.area() as usize * 4)
        .map(|i| seed + i as f32 * 0.125)
        .collect();
    MemoryBuffer::from_data(DataType::Color, rect, data).unwrap()
}

fn key(chunk: usize) -> CacheKey {
    CacheKey::new(OperationId(3), chunk)
}

#[test]
fn publish_get_hit_and_release() {
    let mm = MemoryManager::new(usize::MAX, None);
    mm.publish(key(0), chunk_buffer(1.0)).unwrap();
    assert_eq!(mm.allocated_bytes(), 8 * 4 * 4);
    {
        let guard = mm.get(key(0)).unwrap().unwrap();
        assert_eq!(guard.read(4, 4, EdgeMode::Zero, EdgeMode::Zero)[0], 1.0);
    }
    assert!(mm.get(key(1)).unwrap().is_none());
    let stats = mm.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.reloads, 0);
    assert_eq!(stats.performance(), 1.0);
}

#[test]
fn eviction_round_trip_is_bit_identical() {
    let scratch = tempfile::tempdir().unwrap();
    let mm = MemoryManager::new(0, Some(scratch.path().to_path_buf()));
    let original = chunk_buffer(0.1);
    mm.publish(key(0), original.clone()).unwrap();
    assert!(mm.is_evicted(key(0)));
    assert_eq!(mm.allocated_bytes(), 0);

    let reloaded = mm.get(key(0)).unwrap().unwrap();
    assert_eq!(*reloaded, original);
    let bits: Vec<u32> = reloaded.data().iter().map(|v| v.to_bits()).collect();
    let expected: Vec<u32> = original.data().iter().map(|v| v.to_bits()).collect();
    assert_eq!(bits, expected);
    drop(reloaded);

    let stats = mm.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.reloads, 1);
    assert!(stats.performance() < 1.0);
}

#[test]
fn entries_in_use_are_never_evicted() {
    let mm = MemoryManager::new(200, None);
    mm.publish(key(0), chunk_buffer(0.0)).unwrap();
    let guard = mm.get(key(0)).unwrap().unwrap();
    // Second entry pushes RAM to 256 bytes; only the idle one may go.
    mm.publish(key(1), chunk_buffer(1.0)).unwrap();
    assert!(!mm.is_evicted(key(0)));
    assert!(mm.is_evicted(key(1)));
    drop(guard);
    mm.evict_to_budget().unwrap();
    assert_eq!(mm.allocated_bytes(), 128);
}

#[test]
fn oldest_idle_entry_goes_first() {
    let mm = MemoryManager::new(300, None);
    mm.publish(key(0), chunk_buffer(0.0)).unwrap();
    mm.publish(key(1), chunk_buffer(1.0)).unwrap();
    mm.publish(key(2), chunk_buffer(2.0)).unwrap();
    assert!(mm.is_evicted(key(0)));
    assert!(!mm.is_evicted(key(1)));
    assert!(!mm.is_evicted(key(2)));
}

#[test]
fn allocate_makes_room_first() {
    let mm = MemoryManager::new(128, None);
    mm.publish(key(0), chunk_buffer(0.0)).unwrap();
    let buf = mm.allocate(DataType::Color, Rect::new(0, 0, 4, 2)).unwrap();
    assert!(buf.data().iter().all(|v| *v == 0.0));
    assert!(mm.is_evicted(key(0)));
}

#[test]
fn remove_and_clear_free_everything() {
    let mm = MemoryManager::new(0, None);
    mm.publish(key(0), chunk_buffer(0.0)).unwrap();
    mm.publish(key(1), chunk_buffer(1.0)).unwrap();
    assert!(mm.remove(key(0)));
    assert!(!mm.remove(key(0)));
    assert_eq!(mm.len(), 1);
    mm.clear();
    assert!(mm.is_empty());
    assert_eq!(mm.allocated_bytes(), 0);
}

#[test]
fn release_user_on_unknown_key_is_ignored() {
    let mm = MemoryManager::new(usize::MAX, None);
    mm.release_user(key(42));
    assert_eq!(mm.len(), 0);
}
