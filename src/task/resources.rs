//! Hardware Resource Management
//!
//! Assigns the board's pins and peripherals to the tasks that own them.
//!
//! # Resource Groups
//! - Inductors: four analog inputs on the ADC
//! - Encoders: PWM slices counting rising edges plus direction pins
//! - Motor driver: TB6612FNG standby, direction and PWM pins
//! - Fan: one PWM output
//! - IMU: SPI0 with a chip select
//! - Start button

use assign_resources::assign_resources;
use embassy_rp::adc::InterruptHandler as AdcInterruptHandler;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals;

assign_resources! {
    /// Electromagnetic inductor channels (left/right, horizontal/vertical)
    inductors: InductorResources {
        adc: ADC,
        left_x: PIN_26,
        left_y: PIN_27,
        right_x: PIN_28,
        right_y: PIN_29,
    },
    /// Wheel encoders: pulse input on PWM channel B, direction on a plain GPIO
    encoders: EncoderResources {
        left_slice: PWM_SLICE3,
        left_pulse_pin: PIN_7,
        left_direction_pin: PIN_6,
        right_slice: PWM_SLICE4,
        right_pulse_pin: PIN_9,
        right_direction_pin: PIN_8,
    },
    /// TB6612FNG dual motor driver pins and PWM channels
    motor_driver: MotorDriverResources {
        standby_pin: PIN_22,
        left_slice: PWM_SLICE0,
        left_pwm_pin: PIN_16,
        left_forward_pin: PIN_20,
        left_backward_pin: PIN_21,
        right_slice: PWM_SLICE1,
        right_pwm_pin: PIN_19,
        right_forward_pin: PIN_17,
        right_backward_pin: PIN_18,
    },
    /// Suction fan ESC input
    fan: FanResources {
        slice: PWM_SLICE2,
        pin: PIN_4,
    },
    /// LSM6DSR or MPU6500 on SPI0
    imu: ImuResources {
        spi: SPI0,
        clk: PIN_2,
        mosi: PIN_3,
        miso: PIN_0,
        cs: PIN_1,
    },
    /// Start/stop push button
    start_button: StartButtonResources {
        pin: PIN_15,
    },
}

bind_interrupts!(pub struct Irqs {
    ADC_IRQ_FIFO => AdcInterruptHandler;
});
