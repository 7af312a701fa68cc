//! The prediction driver: run a trained model over the validation images
//! one at a time and report each verdict.

use std::io::{self, Write};

use ndarray::prelude::*;

use crate::config::PredictConfig;
use crate::dataset::Dataset;
use crate::definition;
use crate::error::{Error, Result};
use crate::metrics::argmax;
use crate::model::Model;
use crate::traits::{Layer, Loss};

/// The model's verdict on one example.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// Position of the example in load order.
    pub index: usize,
    pub predicted: usize,
    pub actual: usize,
    /// Output of the network for this example.
    pub distribution: Array1<f32>,
}

impl PredictionRecord {
    pub fn is_correct(&self) -> bool {
        self.predicted == self.actual
    }
}

/// Classify every example in `data`, one at a time.
pub fn evaluate<N, L>(model: &Model<N, L>, data: &Dataset) -> Result<Vec<PredictionRecord>>
where
    N: Layer<Ix4, Output = Ix2>,
    L: Loss<Ix2>,
{
    (0..data.len()).map(|i| predict_one(model, data, i)).collect()
}

fn predict_one<N, L>(model: &Model<N, L>, data: &Dataset, index: usize) -> Result<PredictionRecord>
where
    N: Layer<Ix4, Output = Ix2>,
    L: Loss<Ix2>,
{
    let (image, label) = data.get(index);
    let x = image.insert_axis(Axis(0));
    let distribution = model.predict(x)?.index_axis_move(Axis(0), 0);
    Ok(PredictionRecord {
        index,
        predicted: argmax(distribution.view()),
        actual: argmax(label),
        distribution,
    })
}

/// Fraction of records that are correct. Zero if there are none.
pub fn accuracy(records: &[PredictionRecord]) -> f32 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| r.is_correct()).count() as f32 / records.len() as f32
}

/// Write one line per record: `image {i} CORRECT [p0, p1]` or
/// `image {i} WRONG [p0, p1]`.
pub fn report(records: &[PredictionRecord], out: &mut impl Write) -> io::Result<()> {
    for record in records {
        let verdict = if record.is_correct() { "CORRECT" } else { "WRONG" };
        writeln!(
            out,
            "image {} {verdict} {:?}",
            record.index,
            record.distribution.as_slice().unwrap_or(&[])
        )?;
    }
    Ok(())
}

/// Load the trained classifier and report on every validation image.
pub fn run(config: &PredictConfig) -> Result<Vec<PredictionRecord>> {
    let mut model = definition::model();
    model.load(&config.model)?;
    let (height, width, _) = model.input_shape();
    let data = Dataset::load(&config.val_dir, height, width, model.num_classes())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut records = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        let record = predict_one(&model, &data, i)?;
        report(std::slice::from_ref(&record), &mut out).map_err(|err| Error::io("<stdout>", err))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, predicted: usize, actual: usize, p: [f32; 2]) -> PredictionRecord {
        PredictionRecord {
            index,
            predicted,
            actual,
            distribution: arr1(&p),
        }
    }

    #[test]
    fn report_lines() {
        let records = [
            record(0, 1, 1, [0.25, 0.75]),
            record(1, 0, 1, [0.5, 0.5]),
        ];
        let mut out = vec![];
        report(&records, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "image 0 CORRECT [0.25, 0.75]\nimage 1 WRONG [0.5, 0.5]\n"
        );
        assert_eq!(accuracy(&records), 0.5);
        assert_eq!(accuracy(&[]), 0.0);
    }
}
