//! Writes a small synthetic AIBL-style source tree and tabular file:
//!
//! ```text
//! <out>/AIBL/<site>/<subject>/MPRAGE.nii
//! <out>/data/tabular_data.csv
//! ```
//!
//! Point `mri-prep prepare` at it with `--source-root <out>/AIBL
//! --dataset-root <out>/data/mri_images --tabular <out>/data/tabular_data.csv`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mri_prep::volume::nifti::write_nifti1;
use mri_prep::volume::Volume;

#[derive(Debug, Parser)]
#[command(name = "generate-sample", about = "Write a synthetic scan tree for mri-prep")]
struct Args {
    #[arg(long, default_value = "sample")]
    out: PathBuf,

    #[arg(long, default_value_t = 12)]
    subjects: usize,

    /// Edge length of each cubic volume
    #[arg(long, default_value_t = 32)]
    size: usize,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// A bright ellipsoid ("brain") in a dark field, plus noise.
fn phantom(size: usize, rng: &mut SimpleRng) -> Volume {
    let c = size as f64 / 2.0;
    let (ax, ay, az) = (
        c * rng.gauss(0.7, 0.05),
        c * rng.gauss(0.8, 0.05),
        c * rng.gauss(0.65, 0.05),
    );
    let mut noise: Vec<f32> = (0..size * size * size)
        .map(|_| rng.gauss(0.0, 8.0) as f32)
        .collect();

    Volume::from_fn([size, size, size], |x, y, z| {
        let d = ((x as f64 - c) / ax).powi(2)
            + ((y as f64 - c) / ay).powi(2)
            + ((z as f64 - c) / az).powi(2);
        let tissue = if d <= 1.0 { 400.0 * (1.0 - 0.5 * d) } else { 0.0 };
        tissue as f32 + noise.pop().unwrap_or(0.0)
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(42);

    let source = args.out.join("AIBL");
    let data = args.out.join("data");
    std::fs::create_dir_all(&data).with_context(|| format!("creating {}", data.display()))?;

    let sites = ["site_a", "site_b", "site_c"];
    let mut csv = csv::Writer::from_path(data.join("tabular_data.csv"))
        .context("creating tabular_data.csv")?;
    csv.write_record(["PATIENT_ID", "SCAN_NUM", "PROJECT", "AGE"])?;

    let mut scans = 0usize;
    for i in 0..args.subjects {
        let id = (1001 + i).to_string();
        let project = if i % 5 == 4 { "ADNI" } else { "AIBL" };
        let age = format!("{:.1}", rng.gauss(72.0, 6.0));

        csv.write_record([id.as_str(), "1", project, age.as_str()])?;
        csv.write_record([id.as_str(), "2", project, age.as_str()])?;

        // Every seventh subject has metadata but no scan on disk.
        if i % 7 == 6 {
            continue;
        }
        let dir = source.join(sites[i % sites.len()]).join(&id);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        write_nifti1(&dir.join("MPRAGE.nii"), &phantom(args.size, &mut rng))?;
        scans += 1;
    }
    csv.flush()?;

    println!(
        "Wrote {scans} scans ({0}x{0}x{0}) for {1} subjects under {2}",
        args.size,
        args.subjects,
        args.out.display()
    );
    Ok(())
}
