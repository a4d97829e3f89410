//! The run loop.

use log::trace;

use super::{VmError, VmResult};
use crate::bytecode::{
    AluOp, BpfInsn, JmpOp, OpcodeClass, Operand, Register, RegisterFile, Text, WideInsn, WideLoad,
};
use crate::call::{CallContext, CallTable};
use crate::memory::MemoryMap;
use crate::store::{KvStore, LocalTree};

/// Everything one run borrows from its VM.
pub(super) struct Interpreter<'r, 'm> {
    pub text: Text<'r>,
    pub data_base: u64,
    pub rodata_base: u64,
    pub memory: MemoryMap<'m>,
    pub calls: &'r CallTable,
    pub store: &'r KvStore,
    pub local: &'r mut LocalTree,
    pub branches: &'r mut u32,
    pub allow_no_return: bool,
}

/// Where control goes after an instruction.
enum Flow {
    Next,
    Skip,
    Jump(usize),
    Exit,
}

impl Interpreter<'_, '_> {
    pub fn run(mut self, mut regs: RegisterFile) -> VmResult {
        let mut pc = 0usize;

        loop {
            let Some(insn) = self.text.get(pc) else {
                if self.allow_no_return && pc == self.text.len() {
                    trace!("ran off the end at {}", pc);
                    return Ok(regs.return_value() as i64);
                }
                return Err(VmError::IllegalJump { pc });
            };

            match self.step(pc, insn, &mut regs)? {
                Flow::Next => pc += 1,
                Flow::Skip => pc += 2,
                Flow::Jump(target) => pc = target,
                Flow::Exit => return Ok(regs.return_value() as i64),
            }
        }
    }

    fn step(&mut self, pc: usize, insn: BpfInsn, regs: &mut RegisterFile) -> Result<Flow, VmError> {
        let illegal = VmError::IllegalInstruction {
            pc,
            opcode: insn.opcode,
        };
        let dst = insn.dst().ok_or(VmError::IllegalRegister { pc })?;
        let src = insn.src().ok_or(VmError::IllegalRegister { pc })?;

        match insn.class().ok_or(illegal)? {
            OpcodeClass::Alu32 | OpcodeClass::Alu64 => {
                let op = insn.alu_op().ok_or(illegal)?;
                let operand = match insn.operand() {
                    Operand::Reg => regs.get(src),
                    Operand::Imm => insn.imm as i64 as u64,
                };
                let value = if insn.is_alu64() {
                    alu64(op, regs.get(dst), operand)
                } else {
                    alu32(op, regs.get(dst) as u32, operand as u32).map(u64::from)
                };
                regs.set(dst, value.ok_or(VmError::IllegalDiv { pc })?);
                Ok(Flow::Next)
            }

            OpcodeClass::Ld => {
                let kind = WideLoad::from_opcode(insn.opcode).ok_or(illegal)?;
                let next = self.text.get(pc + 1).ok_or(VmError::IllegalJump { pc })?;
                let imm = WideInsn::from_slots(insn, next).imm64();
                let value = match kind {
                    WideLoad::Imm => imm,
                    WideLoad::Data => self.data_base.wrapping_add(imm),
                    WideLoad::Rodata => self.rodata_base.wrapping_add(imm),
                };
                regs.set(dst, value);
                Ok(Flow::Skip)
            }

            OpcodeClass::Ldx => {
                let size = insn.mem_size().ok_or(illegal)?;
                let addr = regs.get(src).wrapping_add(insn.offset as i64 as u64);
                let value = self
                    .memory
                    .load(addr, size)
                    .map_err(|access| VmError::IllegalMem { pc, access })?;
                regs.set(dst, value);
                Ok(Flow::Next)
            }

            class @ (OpcodeClass::St | OpcodeClass::Stx) => {
                let size = insn.mem_size().ok_or(illegal)?;
                let addr = regs.get(dst).wrapping_add(insn.offset as i64 as u64);
                let value = match class {
                    OpcodeClass::St => insn.imm as i64 as u64,
                    _ => regs.get(src),
                };
                self.memory
                    .store(addr, size, value)
                    .map_err(|access| VmError::IllegalMem { pc, access })?;
                Ok(Flow::Next)
            }

            OpcodeClass::Jmp => match insn.jmp_op().ok_or(illegal)? {
                JmpOp::Exit if insn.is_exit() => Ok(Flow::Exit),
                JmpOp::Call if insn.is_call() => {
                    self.call(pc, insn.imm, regs)?;
                    Ok(Flow::Next)
                }
                JmpOp::Exit | JmpOp::Call => Err(illegal),
                op => {
                    let operand = match insn.operand() {
                        Operand::Reg => regs.get(src),
                        Operand::Imm => insn.imm as i64 as u64,
                    };
                    if !op.taken(regs.get(dst), operand) {
                        return Ok(Flow::Next);
                    }
                    self.take_branch(pc, insn).map(Flow::Jump)
                }
            },
        }
    }

    fn take_branch(&mut self, pc: usize, insn: BpfInsn) -> Result<usize, VmError> {
        if *self.branches == 0 {
            trace!("branch budget exhausted at {}", pc);
            return Err(VmError::OutOfBranches);
        }
        *self.branches -= 1;

        let target = insn.branch_target(pc);
        if target < 0 || target >= self.text.len() as i64 {
            return Err(VmError::IllegalJump { pc });
        }
        Ok(target as usize)
    }

    fn call(&mut self, pc: usize, call_id: i32, regs: &mut RegisterFile) -> Result<(), VmError> {
        let handler = self
            .calls
            .lookup(call_id)
            .ok_or(VmError::IllegalCall { pc, call_id })?;
        trace!("call {:#x} at {}", call_id, pc);

        let mut ctx = CallContext::new(&mut self.memory, self.store, &mut *self.local);
        let ret = handler(&mut ctx, regs.call_args());
        regs.set(Register::R0, ret);
        Ok(())
    }
}

/// 64-bit ALU operation; `None` on division by zero.
fn alu64(op: AluOp, dst: u64, src: u64) -> Option<u64> {
    let value = match op {
        AluOp::Add => dst.wrapping_add(src),
        AluOp::Sub => dst.wrapping_sub(src),
        AluOp::Mul => dst.wrapping_mul(src),
        AluOp::Div => dst.checked_div(src)?,
        AluOp::Or => dst | src,
        AluOp::And => dst & src,
        AluOp::Lsh => dst << (src & 63),
        AluOp::Rsh => dst >> (src & 63),
        AluOp::Neg => (dst as i64).wrapping_neg() as u64,
        AluOp::Mod => dst.checked_rem(src)?,
        AluOp::Xor => dst ^ src,
        AluOp::Mov => src,
        AluOp::Arsh => ((dst as i64) >> (src & 63)) as u64,
    };
    Some(value)
}

/// 32-bit ALU operation on the low halves; the result is zero-extended.
fn alu32(op: AluOp, dst: u32, src: u32) -> Option<u32> {
    let value = match op {
        AluOp::Add => dst.wrapping_add(src),
        AluOp::Sub => dst.wrapping_sub(src),
        AluOp::Mul => dst.wrapping_mul(src),
        AluOp::Div => dst.checked_div(src)?,
        AluOp::Or => dst | src,
        AluOp::And => dst & src,
        AluOp::Lsh => dst << (src & 31),
        AluOp::Rsh => dst >> (src & 31),
        AluOp::Neg => (dst as i32).wrapping_neg() as u32,
        AluOp::Mod => dst.checked_rem(src)?,
        AluOp::Xor => dst ^ src,
        AluOp::Mov => src,
        AluOp::Arsh => ((dst as i32) >> (src & 31)) as u32,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alu64_semantics() {
        assert_eq!(alu64(AluOp::Div, 10, 0), None);
        assert_eq!(alu64(AluOp::Mod, 10, 0), None);
        assert_eq!(alu64(AluOp::Div, u64::MAX, 2), Some(u64::MAX / 2));
        assert_eq!(alu64(AluOp::Lsh, 1, 65), Some(2));
        assert_eq!(alu64(AluOp::Arsh, (-16i64) as u64, 2), Some((-4i64) as u64));
        assert_eq!(alu64(AluOp::Neg, 5, 0), Some((-5i64) as u64));
    }

    #[test]
    fn alu32_semantics() {
        assert_eq!(alu32(AluOp::Add, u32::MAX, 1), Some(0));
        assert_eq!(alu32(AluOp::Div, 7, 0), None);
        assert_eq!(alu32(AluOp::Rsh, 0x8000_0000, 33), Some(0x4000_0000));
        assert_eq!(alu32(AluOp::Arsh, 0x8000_0000, 31), Some(u32::MAX));
        assert_eq!(alu32(AluOp::Neg, 1, 0), Some(u32::MAX));
    }
}
