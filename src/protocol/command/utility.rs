use crate::constant::CommandByte;
use crate::protocol::primitive::*;

/// Write COM_QUIT command
pub fn write_quit(out: &mut Vec<u8>) {
    write_int_1(out, CommandByte::Quit as u8);
}
