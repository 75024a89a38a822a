//! Buffer, View and Group lifecycle through the public API

use meshstore_datastore::{DataStore, Error, TypeId, ViewState};

#[test]
fn test_buffer_indices_reuse_smallest_free_slot() {
    let mut ds = DataStore::new();
    let a = ds.create_buffer();
    let b = ds.create_buffer();
    assert_eq!((a, b), (0, 1));

    ds.destroy_buffer(a).unwrap();
    assert_eq!(ds.create_buffer(), 0);
    assert_eq!(ds.create_buffer(), 2);
    assert_eq!(ds.num_buffers(), 3);
}

#[test]
fn test_destroying_a_buffer_in_use_fails() {
    let mut ds = DataStore::new();
    let id = ds
        .root_mut()
        .create_view_and_allocate("x", TypeId::Float64, 4)
        .unwrap();
    let index = ds.view(id).unwrap().buffer_index().unwrap();

    let err = ds.destroy_buffer(index).unwrap_err();
    assert!(matches!(err, Error::BufferInUse { views: 1, .. }));
    assert!(ds.has_buffer(index));
    assert_eq!(ds.diagnostics().len(), 1);
}

#[test]
fn test_reallocate_preserves_leading_values() {
    let mut ds = DataStore::new();
    let id = ds
        .root_mut()
        .create_view_and_allocate("ints", TypeId::Int32, 10)
        .unwrap();
    {
        let mut view = ds.view_mut(id).unwrap();
        for (i, slot) in view.data_mut::<i32>().unwrap().iter_mut().enumerate() {
            *slot = i as i32;
        }
        view.try_reallocate(5).unwrap();
    }

    let view = ds.view(id).unwrap();
    assert_eq!(view.data::<i32>().unwrap(), &[0, 1, 2, 3, 4]);
    assert_eq!(view.total_bytes(), 20);
    assert_eq!(view.buffer().unwrap().total_bytes(), 20);
    assert!(view.is_applied());
}

#[test]
fn test_void_ptr_is_base_plus_offset() {
    let mut ds = DataStore::new();
    let buffer = ds.create_buffer_typed(TypeId::Int16, 8).unwrap();
    let id = ds.root_mut().create_view("odd").unwrap();
    ds.view_mut(id)
        .unwrap()
        .attach_buffer(Some(buffer))
        .apply_with(3, 1, 2);

    let view = ds.view(id).unwrap();
    assert!(view.is_applied());
    assert_eq!(view.offset().unwrap(), 1);
    assert_eq!(view.stride().unwrap(), 2);

    let base = ds.buffer(buffer).unwrap().bytes().as_ptr();
    let ptr = view.void_ptr().unwrap().as_ptr() as *const u8;
    assert_eq!(ptr as usize - base as usize, 2);

    let vals: Vec<i16> = (0..3).map(|i| view.value_at::<i16>(i).unwrap()).collect();
    assert_eq!(vals, vec![0, 0, 0]);
}

#[test]
fn test_apply_twice_is_idempotent() {
    let mut ds = DataStore::new();
    let id = ds
        .root_mut()
        .create_view_and_allocate("v", TypeId::UInt8, 16)
        .unwrap();
    let before = ds.view(id).unwrap().schema().copied();
    ds.view_mut(id).unwrap().apply().apply();
    let view = ds.view(id).unwrap();
    assert!(view.is_applied());
    assert_eq!(view.schema().copied(), before);
    assert!(ds.diagnostics().is_empty());
}

#[test]
fn test_rename_collision_returns_false() {
    let mut ds = DataStore::new();
    ds.root_mut().create_view("a").unwrap();
    let b = ds.root_mut().create_view("b").unwrap();

    assert!(!ds.view_mut(b).unwrap().rename("a"));
    assert_eq!(ds.view(b).unwrap().name(), "b");
    assert!(ds.view_mut(b).unwrap().rename("c"));
    assert!(ds.root().has_view("c"));
    assert!(!ds.root().has_view("b"));
}

#[test]
fn test_rejected_chain_leaves_view_unchanged() {
    let mut ds = DataStore::new();
    let id = ds.root_mut().create_view_scalar("s", 7i64).unwrap();
    ds.view_mut(id)
        .unwrap()
        .describe(TypeId::Float32, 3)
        .allocate();

    let view = ds.view(id).unwrap();
    assert_eq!(view.state(), ViewState::Scalar);
    assert_eq!(view.scalar::<i64>().unwrap(), 7);
    let ops: Vec<_> = ds.diagnostics().iter().map(|d| d.operation).collect();
    assert_eq!(ops, vec!["describe", "allocate"]);
}

#[test]
fn test_shared_buffer_between_views() {
    let mut ds = DataStore::new();
    let buffer = ds.create_buffer_typed(TypeId::Float64, 6).unwrap();
    let x = ds
        .root_mut()
        .create_view_with_buffer("xyz/x", TypeId::Float64, 3, buffer)
        .unwrap();
    let y = ds.root_mut().create_view("xyz/y").unwrap();
    ds.view_mut(y)
        .unwrap()
        .attach_buffer(Some(buffer))
        .apply_typed(TypeId::Float64, 3, 3, 1);

    assert_eq!(ds.buffer(buffer).unwrap().num_views(), 2);
    ds.view_mut(y).unwrap().set_value_at(0, 9.5f64).unwrap();
    assert_eq!(ds.view(x).unwrap().value_at::<f64>(0).unwrap(), 0.0);
    assert_eq!(ds.buffer(buffer).unwrap().data::<f64>().unwrap()[3], 9.5);

    // neither View may reallocate a shared Buffer
    let err = ds.view_mut(x).unwrap().try_reallocate(10).unwrap_err();
    assert!(matches!(err, Error::SharedBuffer { views: 2, .. }));

    ds.root_mut().destroy_view("xyz/x").unwrap();
    assert_eq!(ds.buffer(buffer).unwrap().num_views(), 1);
    ds.root_mut().destroy_view_and_data("xyz/y").unwrap();
    assert!(!ds.has_buffer(buffer));
}

#[test]
fn test_destroy_group_keeps_buffers() {
    let mut ds = DataStore::new();
    let id = ds
        .root_mut()
        .create_view_and_allocate("mesh/coords/x", TypeId::Float64, 4)
        .unwrap();
    let index = ds.view(id).unwrap().buffer_index().unwrap();

    ds.root_mut().destroy_group("mesh").unwrap();
    assert!(ds.view(id).is_none());
    assert_eq!(ds.num_groups(), 1);
    assert!(ds.has_buffer(index));
    assert_eq!(ds.buffer(index).unwrap().num_views(), 0);
    assert_eq!(ds.destroy_unused_buffers(), 1);
}

#[test]
fn test_move_and_copy_views() {
    let mut ds = DataStore::new();
    let dest = ds.root_mut().create_group("dest").unwrap();
    let id = ds
        .root_mut()
        .create_view_and_allocate("src/v", TypeId::Int64, 2)
        .unwrap();

    let copy = ds.root_mut().copy_view("src/v", dest).unwrap();
    assert_ne!(copy, id);
    assert!(ds.view(copy).unwrap().is_equivalent_to(&ds.view(id).unwrap()));
    assert_eq!(
        ds.view(copy).unwrap().buffer_index(),
        ds.view(id).unwrap().buffer_index()
    );

    // the copy now occupies dest/v
    let err = ds.root_mut().move_view("src/v", dest).unwrap_err();
    assert!(matches!(err, Error::NameCollision { .. }));

    ds.root_mut().destroy_view("dest/v").unwrap();
    let moved = ds.root_mut().move_view("src/v", dest).unwrap();
    assert_eq!(ds.view(moved).unwrap().path_name(), "dest/v");
    assert!(!ds.root().has_view("src/v"));
}
