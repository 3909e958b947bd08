// Hardware Abstraction Layer (HAL) Module
//
// Die Controller-Implementierung hinter dem `PwmController` Trait aus
// pilight-core. Auf dem Pi selbst läuft nur `pigpiod`.

pub mod pigpio;

pub use pigpio::PigpioController;
