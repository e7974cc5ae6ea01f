/// Monthly contribution for a 1-indexed step. The bump lands on steps 12, 24,
/// 36, ... so the 12th observation already uses the raised amount.
pub fn contribution_for_step(initial_monthly_contribution: f64, yearly_bump: f64, step: usize) -> f64 {
    let bumps = (step / 12) as f64;
    initial_monthly_contribution + yearly_bump * bumps
}
