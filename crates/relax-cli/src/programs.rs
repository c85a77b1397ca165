//! Built-in litmus programs.
//!
//! Each program is a closed test: it creates its objects, spawns its
//! threads, and records the values it observed. The checker then owns
//! every scheduling and reads-from decision.

use std::sync::{Arc, Mutex as StdMutex};

use relax_rt::{
    model, model_assert, record, spawn, Atomic, CheckSummary, MemOrder, Mutex, Params, Shared,
};

pub const PROGRAMS: &[(&str, &str)] = &[
    ("sb", "store buffering with release stores and acquire loads"),
    ("mp", "message passing: plain data published by a release flag"),
    ("rmw", "three threads fetch_add a shared counter"),
    ("promise", "relaxed load observing a later relaxed store via a promise"),
    ("deadlock", "classic lock-order inversion on two mutexes"),
    ("rwlock", "linux-style reader-writer lock, two mixed reader/writer threads"),
];

pub fn run(name: &str, params: Params) -> Option<CheckSummary> {
    match name {
        "sb" => Some(sb(params)),
        "mp" => Some(mp(params)),
        "rmw" => Some(rmw(params)),
        "promise" => Some(promise(params)),
        "deadlock" => Some(deadlock(params)),
        "rwlock" => Some(rwlock(params)),
        _ => None,
    }
}

/// Thread 1: x := 1 (rel); r1 := y (acq). Thread 2 symmetric.
fn sb(params: Params) -> CheckSummary {
    model(params, || {
        let x = Arc::new(Atomic::new(0));
        let y = Arc::new(Atomic::new(0));
        let r1 = Arc::new(StdMutex::new(0u64));
        let r2 = Arc::new(StdMutex::new(0u64));

        let t1 = {
            let (x, y, r1) = (x.clone(), y.clone(), r1.clone());
            spawn(move || {
                x.store(1, MemOrder::Release);
                *r1.lock().unwrap() = y.load(MemOrder::Acquire);
            })
        };
        let t2 = {
            let (x, y, r2) = (x.clone(), y.clone(), r2.clone());
            spawn(move || {
                y.store(1, MemOrder::Release);
                *r2.lock().unwrap() = x.load(MemOrder::Acquire);
            })
        };
        t1.join();
        t2.join();
        record(*r1.lock().unwrap());
        record(*r2.lock().unwrap());
    })
}

/// The consumer spins on an acquire flag, then asserts the relaxed data
/// is visible.
fn mp(mut params: Params) -> CheckSummary {
    if params.bound == 0 {
        params.bound = 60;
    }
    model(params, || {
        let data = Arc::new(Shared::new(0u64));
        let flag = Arc::new(Atomic::new(0));

        let producer = {
            let (data, flag) = (data.clone(), flag.clone());
            spawn(move || {
                data.set(42);
                flag.store(1, MemOrder::Release);
            })
        };
        let consumer = {
            let (data, flag) = (data.clone(), flag.clone());
            spawn(move || {
                while flag.load(MemOrder::Acquire) != 1 {}
                model_assert(data.get() == 42, "data must be visible once the flag is");
            })
        };
        producer.join();
        consumer.join();
    })
}

/// Every feasible execution must end with the counter at 3.
fn rmw(params: Params) -> CheckSummary {
    model(params, || {
        let counter = Arc::new(Atomic::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let counter = counter.clone();
                spawn(move || {
                    counter.fetch_add(1, MemOrder::AcqRel);
                })
            })
            .collect();
        for h in handles {
            h.join();
        }
        let total = counter.load(MemOrder::Relaxed);
        record(total);
        model_assert(total == 3, "three increments must sum to three");
    })
}

/// Thread 1 loads x relaxed; thread 2 stores 1 relaxed later. The
/// checker must find the execution where the load observes the future
/// store through a promise.
fn promise(params: Params) -> CheckSummary {
    model(params, || {
        let x = Arc::new(Atomic::new(0));
        let r = Arc::new(StdMutex::new(0u64));

        let t1 = {
            let (x, r) = (x.clone(), r.clone());
            spawn(move || {
                *r.lock().unwrap() = x.load(MemOrder::Relaxed);
            })
        };
        let t2 = {
            let x = x.clone();
            spawn(move || {
                x.store(1, MemOrder::Relaxed);
            })
        };
        t1.join();
        t2.join();
        record(*r.lock().unwrap());
    })
}

/// Thread 1 takes A then B; thread 2 takes B then A.
fn deadlock(params: Params) -> CheckSummary {
    model(params, || {
        let a = Arc::new(Mutex::new());
        let b = Arc::new(Mutex::new());

        let t1 = {
            let (a, b) = (a.clone(), b.clone());
            spawn(move || {
                let _ga = a.lock();
                let _gb = b.lock();
            })
        };
        let t2 = {
            let (a, b) = (a.clone(), b.clone());
            spawn(move || {
                let _gb = b.lock();
                let _ga = a.lock();
            })
        };
        t1.join();
        t2.join();
    })
}

const RW_LOCK_BIAS: u64 = 0x0010_0000;

fn read_lock(lock: &Atomic) {
    let mut current = lock.fetch_sub(1, MemOrder::Acquire) as i64;
    // fetch ops return the previous value; the slow path re-adds the
    // unit and spins until readers are admitted again.
    while current <= 0 {
        lock.fetch_add(1, MemOrder::Relaxed);
        loop {
            if lock.load(MemOrder::Relaxed) as i64 > 0 {
                break;
            }
        }
        current = lock.fetch_sub(1, MemOrder::Acquire) as i64;
    }
}

fn read_unlock(lock: &Atomic) {
    lock.fetch_add(1, MemOrder::Release);
}

fn write_lock(lock: &Atomic) {
    let mut current = lock.fetch_sub(RW_LOCK_BIAS, MemOrder::Acquire);
    while current != RW_LOCK_BIAS {
        lock.fetch_add(RW_LOCK_BIAS, MemOrder::Relaxed);
        loop {
            if lock.load(MemOrder::Relaxed) == RW_LOCK_BIAS {
                break;
            }
        }
        current = lock.fetch_sub(RW_LOCK_BIAS, MemOrder::Acquire);
    }
}

fn write_unlock(lock: &Atomic) {
    lock.fetch_add(RW_LOCK_BIAS, MemOrder::Release);
}

/// Two threads, each one guarded read then one guarded write, against a
/// linux-style biased reader-writer lock.
fn rwlock(mut params: Params) -> CheckSummary {
    if params.bound == 0 {
        params.bound = 120;
    }
    if params.maxreads == 0 {
        params.maxreads = 4;
    }
    model(params, || {
        let lock = Arc::new(Atomic::new(RW_LOCK_BIAS));
        let data = Arc::new(Shared::new(0u64));

        let handles: Vec<_> = (1..=2u64)
            .map(|i| {
                let (lock, data) = (lock.clone(), data.clone());
                spawn(move || {
                    read_lock(&lock);
                    let seen = data.get();
                    read_unlock(&lock);
                    model_assert(seen == 0 || seen == 1, "data holds a written value");

                    write_lock(&lock);
                    data.set(i % 2);
                    write_unlock(&lock);
                })
            })
            .collect();
        for h in handles {
            h.join();
        }
    })
}
