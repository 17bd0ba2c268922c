use super::*;

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn wait_open(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

/// Blocks on the gate for group 0, records everything else.
#[derive(Default)]
struct Recorder {
    gate: Gate,
    seen: Mutex<Vec<(usize, usize)>>,
    cancel_on_gate: bool,
}

impl ChunkExecutor for Recorder {
    fn execute(&self, package: WorkPackage, scheduler: &WorkScheduler) {
        if package.group == 0 {
            self.gate.wait_open();
            if self.cancel_on_gate {
                scheduler.cancel();
            }
            return;
        }
        self.seen.lock().unwrap().push((package.group, package.chunk));
    }
}

fn pkg(group: usize, chunk: usize, priority: u8, distance: f32) -> WorkPackage {
    WorkPackage {
        group,
        chunk,
        priority,
        distance,
    }
}

#[test]
fn zero_threads_is_rejected() {
    let err = WorkScheduler::start(Some(0), Arc::new(Recorder::default())).unwrap_err();
    assert!(err.to_string().contains("threads"));
}

#[test]
fn queued_work_runs_by_priority_then_distance_then_fifo() {
    let rec = Arc::new(Recorder::default());
    let sched = WorkScheduler::start(Some(1), rec.clone()).unwrap();
    assert!(sched.schedule(pkg(0, 0, 9, 0.0)));
    sched.schedule(pkg(1, 0, 0, 0.5));
    sched.schedule(pkg(1, 1, 0, 0.1));
    sched.schedule(pkg(2, 0, 5, 0.9));
    sched.schedule(pkg(1, 2, 0, 0.1));
    rec.gate.open();
    sched.wait();

    assert_eq!(
        *rec.seen.lock().unwrap(),
        vec![(2, 0), (1, 1), (1, 2), (1, 0)]
    );
    let stats = sched.stats();
    assert_eq!(stats.scheduled, 5);
    assert_eq!(stats.executed, 5);
    assert_eq!(stats.discarded, 0);
}

struct Chain {
    count: Mutex<usize>,
}

impl ChunkExecutor for Chain {
    fn execute(&self, package: WorkPackage, scheduler: &WorkScheduler) {
        *self.count.lock().unwrap() += 1;
        if package.chunk < 9 {
            scheduler.schedule(pkg(package.group, package.chunk + 1, 0, 0.0));
        }
    }
}

#[test]
fn wait_covers_work_scheduled_from_workers() {
    let chain = Arc::new(Chain {
        count: Mutex::new(0),
    });
    let sched = WorkScheduler::start(Some(3), chain.clone()).unwrap();
    sched.schedule(pkg(1, 0, 0, 0.0));
    sched.wait();
    assert_eq!(*chain.count.lock().unwrap(), 10);
}

#[test]
fn cancel_discards_queued_and_refuses_new_work() {
    let rec = Arc::new(Recorder {
        cancel_on_gate: true,
        ..Recorder::default()
    });
    let sched = WorkScheduler::start(Some(1), rec.clone()).unwrap();
    sched.schedule(pkg(0, 0, 9, 0.0));
    for chunk in 0..5 {
        sched.schedule(pkg(1, chunk, 0, 0.0));
    }
    rec.gate.open();
    sched.wait();

    assert!(sched.is_cancelled());
    assert!(rec.seen.lock().unwrap().is_empty());
    assert!(!sched.schedule(pkg(1, 9, 0, 0.0)));
    let stats = sched.stats();
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.discarded, 5);
}
