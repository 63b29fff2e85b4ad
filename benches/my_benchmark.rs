use bvh_anim_importer::{import_bvh_from_string, ImportConfig, MemoryScene};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A chain of `depth` joints with an End Site, followed by `frames` motion lines.
fn synthetic_bvh(depth: usize, frames: usize) -> String {
    let mut bvh = String::from("HIERARCHY\nROOT Hips\n{\n\tOFFSET 0 0 0\n\tCHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation\n");
    for i in 0..depth {
        bvh += &format!("\tJOINT Joint{}\n\t{{\n\t\tOFFSET 0 1.5 0\n\t\tCHANNELS 3 Zrotation Xrotation Yrotation\n", i);
    }
    bvh += "\tEnd Site\n\t{\n\t\tOFFSET 0 1 0\n\t}\n";
    for _ in 0..depth {
        bvh += "\t}\n";
    }
    bvh += "}\nMOTION\n";
    bvh += &format!("Frames: {}\nFrame Time: 0.008333\n", frames);

    let channels = 6 + 3 * depth;
    for frame in 0..frames {
        let line: Vec<String> = (0..channels)
            .map(|c| format!("{:.4}", (frame * channels + c) as f64 * 0.01))
            .collect();
        bvh += &line.join(" ");
        bvh.push('\n');
    }
    bvh
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let bvh = synthetic_bvh(30, 600);
    let config = ImportConfig::default();

    let mut group = c.benchmark_group("sample-size-example");
    group.sample_size(10);
    group.bench_function("import 30 joints x 600 frames", |b| {
        b.iter(|| {
            let mut scene = MemoryScene::new();
            let summary = import_bvh_from_string(black_box(&bvh), "bench.bvh", &mut scene, &config)
                .expect("synthetic file imports");
            black_box(summary.frames_applied)
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
