//! Wishbone register address map for the remote FPGA.
//!
//! These are static configuration data consumed by the command layer, not
//! protocol logic.  Offsets are OR'd onto their block base, e.g.
//! `SSIF_BASE | SSIF_MAX_PWM`.  The full register space is
//! [`WB_REG_SIZE`] bytes, byte addressable, 14-bit addresses.

/// Addressable wishbone register space in bytes (2^14).
pub const WB_REG_SIZE: usize = 16384;

// ---------------------------------------------------------------------------
// Command opcodes and addressing modes (command-record `op` byte, bits [7:6])
// ---------------------------------------------------------------------------

/// Read registers back from the device.
pub const WB_RD_CMD: u8 = 0x00;
/// Write registers on the device.
pub const WB_WR_CMD: u8 = 0x80;
/// Address-increment mode: each byte goes to the next address.
pub const WB_AI_MODE: u8 = 0x40;
/// FIFO mode: constant address, each access is a queue push/pop.
pub const WB_FIFO_MODE: u8 = 0x00;

// ---------------------------------------------------------------------------
// GPIO register space (8-bit GPIO for LEDs and the 7i37 ports)
// ---------------------------------------------------------------------------

pub const GPIO_BASE: u16 = 0x0000;
pub const GPIO_MASK: u16 = 0x000F;
/// GPIO_SYSTEM.[1:0] — soft reset / reconfigure pulses.
pub const GPIO_SYSTEM: u16 = 0x0000;
/// GPIO_SYSTEM bit 0: issue a RESET pulse for logic modules.
pub const GPIO_SOFT_RST: u8 = 0x01;
/// GPIO_SYSTEM bit 1: put the FPGA in re-configuration mode.
pub const GPIO_RECONFIG: u8 = 0x02;
/// Drive the board LEDs.
pub const GPIO_LEDS: u16 = 0x0001;
/// LED source selection: 0 = gpio_leds, 1 = servo pulse, 2 = debug port.
pub const GPIO_LEDS_SEL: u16 = 0x0002;
/// Drive the output ports.
pub const GPIO_OUT: u16 = 0x0003;
/// Mask for input bits [7:0]; inport = mask & bits_i.
pub const GPIO_MASK_IN0: u16 = 0x0004;
/// Mask for input bits [15:8].
pub const GPIO_MASK_IN1: u16 = 0x0005;

// ---------------------------------------------------------------------------
// JCMD register space (Joint Command Processor)
// ---------------------------------------------------------------------------

pub const JCMD_BASE: u16 = 0x0020;
pub const JCMD_MASK: u16 = 0x000F;
/// 2-byte {DIR_W, POS_W} joint command, FIFO mode.  Writing addr[1] pushes
/// the pair into the JCMD FIFO; a full FIFO stalls the device, not the host.
pub const JCMD_POS_W: u16 = 0x0000;
/// Direction polarity per joint, compensates inverse-kinematics sign.
pub const JCMD_DIR_POL: u16 = 0x0001;
/// Control bits [2:0]: {RST, SSIF_EN, BPRU_EN}.
pub const JCMD_CTRL: u16 = 0x0005;
/// JCMD_CTRL bit 0: enable the periodic base-period register update.
pub const JCMD_BPRU_EN: u8 = 0x01;
/// JCMD_CTRL bit 1: servo/stepper interface enable.
pub const JCMD_SSIF_EN: u8 = 0x02;
/// JCMD_CTRL bit 2: reset the JCMD FIFO and state machines.
pub const JCMD_RST: u8 = 0x04;

// ---------------------------------------------------------------------------
// SSIF register space (Servo/Stepper InterFace)
// ---------------------------------------------------------------------------

pub const SSIF_BASE: u16 = 0x0080;
pub const SSIF_MASK: u16 = 0x007F;
/// (0x00 ~ 0x0F) JNT_0..JNT_3 sif-command from the JCMD FIFO.
pub const SSIF_SIF_CMD: u16 = 0x0000;
/// (0x10 ~ 0x1F) JNT_0..JNT_3 pulse position to the driver, base-period updated.
pub const SSIF_PULSE_POS: u16 = 0x0010;
/// (0x20 ~ 0x2F) JNT_0..JNT_3 encoder position from the servo driver.
pub const SSIF_ENC_POS: u16 = 0x0020;
/// (0x30 ~ 0x31) 16 input switches for HOME, CCWL and CWL.
pub const SSIF_SWITCH_IN: u16 = 0x0030;
/// (0x40 ~ 0x4F) JNT_0..JNT_3 home position from the servo driver.
pub const SSIF_HOME_POS: u16 = 0x0040;
/// (0x7C ~ 0x7F) JNT_0..JNT_3 max PWM ratio (stepper current limit), 8 bits.
pub const SSIF_MAX_PWM: u16 = 0x007C;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_bases_do_not_overlap_their_masks() {
        assert_eq!(GPIO_BASE & GPIO_MASK, 0);
        assert_eq!(JCMD_BASE & JCMD_MASK, 0);
        assert_eq!(SSIF_BASE & SSIF_MASK, 0);
    }

    #[test]
    fn max_pwm_absolute_address() {
        // The stepper current-limit bank sits at the top of the SSIF block.
        assert_eq!(SSIF_BASE | SSIF_MAX_PWM, 0x00FC);
    }

    #[test]
    fn register_space_fits_14_bit_addresses() {
        assert_eq!(WB_REG_SIZE, 1 << 14);
    }
}
