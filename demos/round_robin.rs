//! Round-Robin Demo - three equal-priority tasks taking turns
//!
//! Three tasks at priority 1 each print a letter and yield. With no
//! blocking involved, the ready-list cursor should rotate through them
//! in strict arrival order: A, B, C, A, B, C, ...

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt::info;
use minikernel::os_task_create;
use minikernel::os_task_yield;
use minikernel::task::OsTcb;
use minikernel::types::OsStkElement;

static SELECTIONS: AtomicU32 = AtomicU32::new(0);

static mut TASK_A_STK: [OsStkElement; 256] = [0; 256];
static mut TASK_A_TCB: OsTcb = OsTcb::new();
static mut TASK_B_STK: [OsStkElement; 256] = [0; 256];
static mut TASK_B_TCB: OsTcb = OsTcb::new();
static mut TASK_C_STK: [OsStkElement; 256] = [0; 256];
static mut TASK_C_TCB: OsTcb = OsTcb::new();

fn make_task(letter: &'static str) -> impl Fn(*mut ()) -> ! {
    move |_arg: *mut ()| -> ! {
        loop {
            let n = SELECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
            info!("{} (selection #{})", letter, n);
            let _ = os_task_yield();
        }
    }
}

fn task_a(_arg: *mut ()) -> ! {
    make_task("A")(_arg)
}

fn task_b(_arg: *mut ()) -> ! {
    make_task("B")(_arg)
}

fn task_c(_arg: *mut ()) -> ! {
    make_task("C")(_arg)
}

#[entry]
fn main() -> ! {
    info!("Round-Robin Demo: A, B, C at priority 1");

    minikernel::os_init().expect("OS init failed");

    unsafe {
        os_task_create(&mut TASK_A_TCB, &mut TASK_A_STK, "A", task_a, 1).unwrap();
        os_task_create(&mut TASK_B_TCB, &mut TASK_B_STK, "B", task_b, 1).unwrap();
        os_task_create(&mut TASK_C_TCB, &mut TASK_C_STK, "C", task_c, 1).unwrap();
    }

    info!("Starting...");
    minikernel::os_start().expect("OS start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
