use criterion::{criterion_group, criterion_main, Criterion};

use cadence_core::{
    CadenceResult, Manager, Msg, Subsystem, SubsystemContext, SubsystemId, SubsystemTree,
    SubsystemView,
};

#[derive(Debug, Clone, Copy)]
enum StageData {
    Level,
}

/// Minimal subsystem exercising the message path: refreshes a local
/// value, requests each child's level, folds the answers in logic.
struct Stage {
    children: Vec<SubsystemId>,
    pending: Vec<Msg>,
    level: f64,
}

impl Stage {
    fn new() -> Self {
        Stage {
            children: Vec::new(),
            pending: Vec::new(),
            level: 0.0,
        }
    }
}

impl Subsystem for Stage {
    fn name(&self) -> &'static str {
        "stage"
    }

    fn update_basic_data(&mut self, _view: &SubsystemView<'_>) -> CadenceResult<()> {
        self.level += 1.0;
        Ok(())
    }

    fn send_data_request(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        for &child in &self.children {
            let msg = Msg::data(StageData::Level);
            ctx.send_request(child, &msg)?;
            self.pending.push(msg);
        }
        Ok(())
    }

    fn receive_data_request(
        &mut self,
        msg: &Msg,
        _ctx: &mut cadence_core::ResponderContext<'_>,
    ) -> CadenceResult<()> {
        if let Some(StageData::Level) = msg.identifier() {
            msg.set_payload(self.level);
        }
        Ok(())
    }

    fn update_logic(&mut self) -> CadenceResult<()> {
        for msg in self.pending.drain(..) {
            if let Some(level) = msg.take_payload::<f64>() {
                self.level = self.level.max(level);
            }
        }
        Ok(())
    }
}

/// Three-level tree: 1 root, `branches` middles, `leaves` leaves each.
fn build_manager(branches: usize, leaves: usize) -> Manager {
    let mut tree = SubsystemTree::new();
    let root = tree.insert_top(Stage::new());
    let mut middle_ids = Vec::new();
    for _ in 0..branches {
        let middle = tree.insert(Stage::new(), root);
        tree.add_child(root, middle).unwrap();
        let mut leaf_ids = Vec::new();
        for _ in 0..leaves {
            let leaf = tree.insert(Stage::new(), middle);
            tree.add_child(middle, leaf).unwrap();
            leaf_ids.push(leaf);
        }
        tree.get_mut::<Stage>(middle).unwrap().children = leaf_ids;
        middle_ids.push(middle);
    }
    tree.get_mut::<Stage>(root).unwrap().children = middle_ids;
    Manager::new(tree).unwrap()
}

fn bench_cycle(c: &mut Criterion) {
    let mut small = build_manager(2, 2);
    c.bench_function("cycle/7_subsystems", |b| {
        b.iter(|| small.cycle().unwrap())
    });

    let mut large = build_manager(8, 8);
    c.bench_function("cycle/73_subsystems", |b| {
        b.iter(|| large.cycle().unwrap())
    });
}

criterion_group!(benches, bench_cycle);
criterion_main!(benches);
