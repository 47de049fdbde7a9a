//! Command task
//!
//! Applies queued motor requests to the registry.

use defmt::*;

use smartmotor_core::{SmartMotorError, SmartMotors};

use crate::channels::{MotorRequest, SharedMotors, COMMANDS};

#[embassy_executor::task]
pub async fn command_task(motors: &'static SharedMotors) {
    info!("Command task started");

    loop {
        let request = COMMANDS.receive().await;
        debug!("Motor request: {:?}", request);
        if let Err(e) = motors.lock(|sm| apply(&mut sm.borrow_mut(), request)) {
            warn!("Rejected {:?}: {:?}", request, e);
        }
    }
}

fn apply(sm: &mut SmartMotors, request: MotorRequest) -> Result<(), SmartMotorError> {
    match request {
        MotorRequest::Set {
            motor,
            value,
            immediate,
        } => sm.set_motor(motor, value, immediate),
        MotorRequest::Run { motor } => sm.run(motor),
        MotorRequest::Stop { motor } => sm.stop(motor),
        MotorRequest::RunAll => {
            sm.run_all();
            Ok(())
        }
        MotorRequest::StopAll => {
            sm.stop_all();
            Ok(())
        }
        MotorRequest::TargetSpeed { motor, rpm } => sm.set_target_speed(motor, rpm),
        MotorRequest::Monitor { kind, enabled } => {
            sm.set_monitor(kind, enabled);
            Ok(())
        }
    }
}
