// src/analysis/indicators.rs
use crate::domain::errors::{AnalysisError, AnalysisResult};

/// Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for SMA calculation. Need at least {} points, got {}",
            period,
            prices.len()
        )));
    }

    let mut result = Vec::with_capacity(prices.len() - period + 1);
    let mut sum = prices.iter().take(period).sum::<f64>();

    // First SMA value
    result.push(sum / period as f64);

    // Calculate remaining values with sliding window
    for i in period..prices.len() {
        sum = sum - prices[i - period] + prices[i];
        result.push(sum / period as f64);
    }

    Ok(result)
}

/// Exponential Moving Average (EMA)
pub fn calculate_ema(prices: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for EMA calculation. Need at least {} points, got {}",
            period,
            prices.len()
        )));
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let mut result = Vec::with_capacity(prices.len() - period + 1);

    // First EMA value is SMA
    let first_sma = prices.iter().take(period).sum::<f64>() / period as f64;
    result.push(first_sma);

    for i in period..prices.len() {
        let previous_ema = result[result.len() - 1];
        let new_ema = (prices[i] - previous_ema) * multiplier + previous_ema;
        result.push(new_ema);
    }

    Ok(result)
}

/// Relative Strength Index (RSI), Wilder-smoothed, latest value only.
pub fn calculate_rsi(prices: &[f64], period: usize) -> AnalysisResult<f64> {
    if prices.len() <= period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for RSI calculation. Need at least {} points, got {}",
            period + 1,
            prices.len()
        )));
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss = losses.iter().take(period).sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss.abs() < f64::EPSILON {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}

/// Rolling standard deviation over `period`-sized windows.
pub fn calculate_rolling_stddev(prices: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for stddev calculation. Need at least {} points, got {}",
            period,
            prices.len()
        )));
    }

    let mut result = Vec::with_capacity(prices.len() - period + 1);
    for window in prices.windows(period) {
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        result.push(variance.sqrt());
    }

    Ok(result)
}

/// Vortex Indicator: the (VI+, VI-) directional pair over `period`-length
/// sums of vortex movement against true range.
pub fn calculate_vortex(
    high_prices: &[f64],
    low_prices: &[f64],
    close_prices: &[f64],
    period: usize,
) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
    let len = high_prices.len().min(low_prices.len()).min(close_prices.len());
    if len < period + 1 || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for Vortex calculation. Need at least {} points, got {}",
            period + 1,
            len
        )));
    }

    let mut vm_plus = Vec::with_capacity(len - 1);
    let mut vm_minus = Vec::with_capacity(len - 1);
    let mut true_ranges = Vec::with_capacity(len - 1);

    for i in 1..len {
        vm_plus.push((high_prices[i] - low_prices[i - 1]).abs());
        vm_minus.push((low_prices[i] - high_prices[i - 1]).abs());

        let tr1 = high_prices[i] - low_prices[i];
        let tr2 = (high_prices[i] - close_prices[i - 1]).abs();
        let tr3 = (low_prices[i] - close_prices[i - 1]).abs();
        true_ranges.push(tr1.max(tr2).max(tr3));
    }

    let mut vi_plus = Vec::with_capacity(vm_plus.len() - period + 1);
    let mut vi_minus = Vec::with_capacity(vm_minus.len() - period + 1);

    for i in period..=vm_plus.len() {
        let tr_sum: f64 = true_ranges[i - period..i].iter().sum();
        if tr_sum.abs() < f64::EPSILON {
            return Err(AnalysisError::IndicatorCalculation(
                "Zero true range over Vortex window".to_string(),
            ));
        }
        vi_plus.push(vm_plus[i - period..i].iter().sum::<f64>() / tr_sum);
        vi_minus.push(vm_minus[i - period..i].iter().sum::<f64>() / tr_sum);
    }

    Ok((vi_plus, vi_minus))
}
