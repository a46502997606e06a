/// Mean and standard deviation of one named parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamStats {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

/// Population mean/std of every parameter. Empty tensors report zeros.
pub fn param_stats(params: &[(String, Vec<f32>)]) -> Vec<ParamStats> {
    params
        .iter()
        .map(|(name, values)| {
            let (mean, std) = mean_std(values);
            ParamStats {
                name: name.clone(),
                mean,
                std,
            }
        })
        .collect()
}

fn mean_std(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count;
    (mean, var.sqrt())
}
