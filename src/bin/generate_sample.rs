use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

const ROWS: usize = 240;

const SALESPEOPLE: [&str; 5] = ["Alice", "Bob", "Chen", "Dana", "Emeka"];
const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const PRODUCTS: [(&str, f64); 4] = [
    ("Laptop", 1200.0),
    ("Monitor", 300.0),
    ("Keyboard", 80.0),
    ("Headset", 150.0),
];

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

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One order line.
struct Sale {
    order_id: i64,
    date: NaiveDate,
    salesperson: &'static str,
    region: &'static str,
    product: &'static str,
    units: i64,
    amount: Option<f64>,
}

fn generate(rng: &mut SimpleRng) -> Result<Vec<Sale>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid start date")?;
    let mut sales = Vec::with_capacity(ROWS);
    for i in 0..ROWS {
        // Roughly 1.5 orders a day, with a slow upward trend in volume.
        let date = start + Duration::days((i as f64 / 1.5) as i64);
        let (product, price) = PRODUCTS[rng.below(PRODUCTS.len())];
        let trend = 1.0 + i as f64 / ROWS as f64 * 0.5;
        let units = (rng.gauss(3.0 * trend, 1.5).round() as i64).max(1);
        let discount = rng.gauss(1.0, 0.05).clamp(0.8, 1.1);
        // About 3% of amounts are missing, and a few are large outliers.
        let amount = match rng.next_f64() {
            r if r < 0.03 => None,
            r if r > 0.99 => Some(units as f64 * price * 8.0),
            _ => Some((units as f64 * price * discount * 100.0).round() / 100.0),
        };
        sales.push(Sale {
            order_id: 1000 + i as i64,
            date,
            salesperson: SALESPEOPLE[rng.below(SALESPEOPLE.len())],
            region: REGIONS[rng.below(REGIONS.len())],
            product,
            units,
            amount,
        });
    }
    Ok(sales)
}

fn write_csv(sales: &[Sale], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["order_id", "date", "salesperson", "region", "product", "units", "amount"])?;
    for s in sales {
        writer.write_record([
            s.order_id.to_string(),
            s.date.format("%Y-%m-%d").to_string(),
            s.salesperson.to_string(),
            s.region.to_string(),
            s.product.to_string(),
            s.units.to_string(),
            s.amount.map(|a| format!("{a:.2}")).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(sales: &[Sale], path: &Path) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid epoch")?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("date", DataType::Date32, false),
        Field::new("salesperson", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("product", DataType::Utf8, false),
        Field::new("units", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(sales.iter().map(|s| s.order_id))),
            Arc::new(Date32Array::from_iter_values(
                sales.iter().map(|s| (s.date - epoch).num_days() as i32),
            )),
            Arc::new(StringArray::from_iter_values(sales.iter().map(|s| s.salesperson))),
            Arc::new(StringArray::from_iter_values(sales.iter().map(|s| s.region))),
            Arc::new(StringArray::from_iter_values(sales.iter().map(|s| s.product))),
            Arc::new(Int64Array::from_iter_values(sales.iter().map(|s| s.units))),
            Arc::new(Float64Array::from(
                sales.iter().map(|s| s.amount).collect::<Vec<_>>(),
            )),
        ],
    )
    .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let sales = generate(&mut rng)?;

    let csv_path = Path::new("sample_sales.csv");
    let parquet_path = Path::new("sample_sales.parquet");
    write_csv(&sales, csv_path)?;
    write_parquet(&sales, parquet_path)?;

    println!(
        "Wrote {} sales rows to {} and {}",
        sales.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
