/// adaptive embedded Runge-Kutta 4(5) IVP solver (Cash-Karp pair)
pub mod cash_karp;
/// adaptive Gauss-Legendre quadrature on a finite interval
pub mod quadrature;
