//! DataStore shared between threads

use std::thread;

use meshstore::{DataStore, TypeId};

use crate::common::*;

#[test]
fn readers_see_writer_updates() {
    init_tracing();
    let mut ds = DataStore::new();
    let id = ds
        .root_mut()
        .create_view_and_allocate("counts", TypeId::Int64, 16)
        .unwrap();
    let shared = ds.into_shared();

    {
        let mut guard = shared.write();
        let mut view = guard.view_mut(id).unwrap();
        for (i, x) in view.data_mut::<i64>().unwrap().iter_mut().enumerate() {
            *x = i as i64 * 3;
        }
    }

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let shared = shared.clone();
            thread::spawn(move || {
                let guard = shared.read();
                let view = guard.view(id).unwrap();
                let data = view.data::<i64>().unwrap();
                (t, data.iter().sum::<i64>())
            })
        })
        .collect();
    for h in handles {
        let (_, sum) = h.join().unwrap();
        assert_eq!(sum, 3 * (0..16).sum::<i64>());
    }
}

#[test]
fn threads_fill_separate_groups() {
    init_tracing();
    let shared = DataStore::new().into_shared();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut guard = shared.write();
                let path = format!("worker_{}/value", t);
                guard.root_mut().create_view_scalar(&path, t as i32).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let guard = shared.read();
    assert_eq!(guard.root().num_groups(), 8);
    for t in 0..8 {
        let view = guard.root().view(&format!("worker_{}/value", t)).unwrap();
        assert_eq!(view.scalar::<i32>().unwrap(), t);
    }
}
