use std::cmp;

pub type CounterType = u8;

/// Histogram of register values: `counts[k]` is the number of registers
/// holding `k`, for `k` in `0..=q + 1`.
pub fn counts(registers: &[CounterType], q: usize) -> Vec<u32> {
    let mut counts = vec![0; q + 2];

    for k in registers {
        counts[*k as usize] += 1;
    }

    counts
}

/// Maximum-likelihood cardinality estimate from a register histogram.
///
/// Algorithm 8 in Ertl, "New cardinality estimation algorithms for
/// HyperLogLog sketches" (2017). `q` is the number of hash bits left for the
/// rank, `64 - p` for 64-bit hashes.
#[allow(clippy::many_single_char_names)]
pub fn mle(counts: &[u32], p: usize, q: usize, relerr: f64) -> f64 {
    let m: u32 = 1 << p;
    if counts[0] == m {
        return 0.;
    }
    if counts[q + 1] == m {
        return f64::INFINITY;
    }

    let k_min = counts.iter().position(|v| *v != 0).unwrap_or(0);
    let k_min_prime = cmp::max(1, k_min);

    let k_max = counts.iter().rposition(|v| *v != 0).unwrap_or(0);
    let k_max_prime = cmp::min(q, k_max);

    let mut z = 0.;
    for i in num_iter::range_step_inclusive(k_max_prime as i32, k_min_prime as i32, -1) {
        z = 0.5 * z + counts[i as usize] as f64;
    }

    // ldexp(x, i) = x * (2 ** i)
    z *= 2f64.powi(-(k_min_prime as i32));

    let mut c_prime = counts[q + 1];
    if q >= 1 {
        c_prime += counts[k_max_prime];
    }

    let mut g_prev = 0.;
    let a = z + (counts[0] as f64);
    let b = z + (counts[q + 1] as f64) * 2f64.powi(-(q as i32));
    let m_prime = (m - counts[0]) as f64;

    let mut x = if b <= 1.5 * a {
        // weak lower bound (47)
        m_prime / (0.5 * b + a)
    } else {
        // strong lower bound (46)
        m_prime / b * (b / a).ln_1p()
    };

    let mut delta_x = x;
    let del = relerr / (m as f64).sqrt();
    while delta_x > x * del {
        // secant method iteration

        let kappa: usize = az::saturating_cast(2. + x.log2().floor());

        // x_prime in [0, 0.25]
        let mut x_prime = x * 2f64.powi(-(cmp::max(k_max_prime, kappa) as i32) - 1);
        let x_pp = x_prime * x_prime;

        // Taylor approximation (58)
        let mut h = x_prime - (x_pp / 3.) + (x_pp * x_pp) * (1. / 45. - x_pp / 472.5);

        // Calculate h(x/2^k), see (56), at this point x_prime = x / (2^(k+2))
        for _k in num_iter::range_step_inclusive(kappa as i32 - 1, k_max_prime as i32, -1) {
            let h_prime = 1. - h;
            h = (x_prime + h * h_prime) / (x_prime + h_prime);
            x_prime += x_prime;
        }

        // compare (53)
        let mut g = c_prime as f64 * h;

        for k in num_iter::range_step_inclusive(k_max_prime as i32 - 1, k_min_prime as i32, -1) {
            let h_prime = 1. - h;
            h = (x_prime + h * h_prime) / (x_prime + h_prime);
            g += counts[k as usize] as f64 * h;
            x_prime += x_prime;
        }

        g += x * a;
        delta_x = if g > g_prev && m_prime >= g {
            // see (54)
            delta_x * (m_prime - g) / (g - g_prev)
        } else {
            0.
        };

        x += delta_x;
        g_prev = g
    }

    m as f64 * x
}
