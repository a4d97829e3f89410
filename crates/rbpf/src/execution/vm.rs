use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use heapless::Vec as RegionVec;
use log::{debug, trace};
use rbpf_abi::VmFlags;

use super::interpreter::Interpreter;
use super::{VmError, VmResult};
use crate::Runtime;
use crate::bytecode::{Program, RegisterFile};
use crate::memory::{MemoryMap, RW, Region, RegionError};
use crate::profile::{ActiveProfile, MAX_REGIONS, PhysicalProfile};
use crate::store::LocalTree;
use crate::verifier::{Verifier, VerifyError};

/// One program bound to a runtime, runnable any number of times.
///
/// The VM owns its stack, a writable copy of the data section and its
/// local key/value tree. Registers are fresh on every run; memory is not.
pub struct Vm<'a> {
    program: Program<'a>,
    runtime: &'a Runtime,
    stack: Box<[u8]>,
    data: Vec<u8>,
    extras: RegionVec<Region<'a>, MAX_REGIONS>,
    local: LocalTree,
    flags: VmFlags,
    preflight: Option<Result<(), VerifyError>>,
    branch_budget: u32,
    branches_remaining: u32,
}

impl<'a> Vm<'a> {
    pub fn new(program: Program<'a>, runtime: &'a Runtime) -> Self {
        Self {
            program,
            runtime,
            stack: Box::default(),
            data: Vec::new(),
            extras: RegionVec::new(),
            local: LocalTree::new(),
            flags: VmFlags::empty(),
            preflight: None,
            branch_budget: ActiveProfile::BRANCH_BUDGET,
            branches_remaining: ActiveProfile::BRANCH_BUDGET,
        }
    }

    /// Taken branches allowed per run.
    pub fn branch_budget(mut self, budget: u32) -> Self {
        self.branch_budget = budget;
        self
    }

    /// Let the program end by running past its last instruction.
    ///
    /// Changing this discards a cached preflight result.
    pub fn allow_no_return(mut self, allow: bool) -> Self {
        if allow != self.flags.contains(VmFlags::NO_RETURN) {
            self.flags.set(VmFlags::NO_RETURN, allow);
            self.flags.remove(VmFlags::PREFLIGHT_DONE);
            self.preflight = None;
        }
        self
    }

    /// Allocate the stack and copy the data section. Idempotent.
    pub fn setup(&mut self) {
        if self.flags.contains(VmFlags::SETUP_DONE) {
            return;
        }
        self.stack = vec![0u8; ActiveProfile::STACK_SIZE].into_boxed_slice();
        self.data = self.program.data().to_vec();
        self.flags.insert(VmFlags::SETUP_DONE);
        trace!(
            "vm setup: stack {} bytes, data {} bytes, rodata {} bytes",
            self.stack.len(),
            self.data.len(),
            self.program.rodata().len()
        );
    }

    /// Map an extra region into every subsequent run.
    ///
    /// The most recently added region is searched first, ahead of the
    /// default regions.
    pub fn add_region(&mut self, region: Region<'a>) -> Result<(), RegionError> {
        self.extras.push(region).map_err(|_| RegionError::TableFull {
            capacity: MAX_REGIONS,
        })
    }

    /// Run preflight if it has not run yet and return its cached result.
    pub fn verify(&mut self) -> Result<(), VerifyError> {
        if let Some(result) = self.preflight {
            return result;
        }
        let result = Verifier::new(self.runtime.calls())
            .allow_no_return(self.flags.contains(VmFlags::NO_RETURN))
            .verify(self.program.text());
        if result.is_ok() {
            self.flags.insert(VmFlags::PREFLIGHT_DONE);
        }
        self.preflight = Some(result);
        result
    }

    /// Run with a context the program may read and write.
    pub fn execute(&mut self, ctx: &mut [u8]) -> VmResult {
        self.prepare()?;
        self.run(Region::writable(ctx, RW))
    }

    /// Run with a context the program may only read.
    pub fn execute_shared(&mut self, ctx: &[u8]) -> VmResult {
        self.prepare()?;
        self.run(Region::read_only(ctx))
    }

    fn prepare(&mut self) -> Result<(), VmError> {
        self.setup();
        self.verify()?;
        Ok(())
    }

    fn run(&mut self, context: Region<'_>) -> VmResult {
        let rodata = self.program.rodata();
        let data_base = self.data.as_ptr() as usize as u64;
        let rodata_base = rodata.as_ptr() as usize as u64;
        let stack_start = self.stack.as_ptr() as usize as u64;
        let stack_len = self.stack.len();
        let ctx_addr = context.start();

        let mut memory = MemoryMap::new();
        for region in self.extras.iter_mut().rev() {
            memory.push(region.reborrow())?;
        }
        memory.push(Region::writable(&mut self.stack[..], RW))?;
        memory.push(Region::read_only(rodata))?;
        memory.push(Region::writable(&mut self.data[..], RW))?;
        memory.push(context)?;

        memory
            .check(stack_start, stack_len, RW)
            .map_err(|access| VmError::IllegalMem { pc: 0, access })?;
        let regs = RegisterFile::for_entry(ctx_addr, stack_start + stack_len as u64);

        self.branches_remaining = self.branch_budget;
        let interpreter = Interpreter {
            text: self.program.text(),
            data_base,
            rodata_base,
            memory,
            calls: self.runtime.calls(),
            store: self.runtime.store(),
            local: &mut self.local,
            branches: &mut self.branches_remaining,
            allow_no_return: self.flags.contains(VmFlags::NO_RETURN),
        };

        let result = interpreter.run(regs);
        match &result {
            Ok(r0) => trace!("run finished: r0 = {}", r0),
            Err(e) => debug!("run aborted: {}", e),
        }
        result
    }

    pub fn program(&self) -> &Program<'a> {
        &self.program
    }

    pub fn flags(&self) -> VmFlags {
        self.flags
    }

    /// Whether preflight has run and passed.
    pub fn is_verified(&self) -> bool {
        self.flags.contains(VmFlags::PREFLIGHT_DONE)
    }

    /// Budget left over from the last run.
    pub fn branches_remaining(&self) -> u32 {
        self.branches_remaining
    }

    /// The writable data section as the program left it.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Visit this VM's local key/value entries in key order.
    pub fn for_each_local(&self, f: impl FnMut(u32, u32)) {
        self.runtime.store().for_each_local(&self.local, f);
    }
}

impl Drop for Vm<'_> {
    fn drop(&mut self) {
        self.runtime.store().release_local(&mut self.local);
    }
}

#[cfg(test)]
mod tests {
    use rbpf_abi::{RBPF_ILLEGAL_DIV, RBPF_NO_RETURN, RBPF_OUT_OF_BRANCHES};

    use super::*;
    use crate::bytecode::{BpfInsn, ImageBuilder, MemSize, WideInsn};

    #[test]
    fn mov_exit() {
        let image = ImageBuilder::new()
            .insn(BpfInsn::mov64_imm(0, 42))
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime);
        assert_eq!(vm.execute(&mut []), Ok(42));
        assert!(vm.is_verified());
    }

    #[test]
    fn division_by_zero() {
        let image = ImageBuilder::new()
            .insn(BpfInsn::mov64_imm(0, 1))
            .insn(BpfInsn::div64_imm(0, 0))
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime);
        assert_eq!(vm.execute(&mut []).map_err(|e| e.code()), Err(RBPF_ILLEGAL_DIV));
    }

    #[test]
    fn branch_budget_bounds_loops() {
        let image = ImageBuilder::new().insn(BpfInsn::ja(-1)).exit().build().expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime).branch_budget(10);
        assert_eq!(vm.execute(&mut []), Err(VmError::OutOfBranches));
        assert_eq!(vm.branches_remaining(), 0);
        assert_eq!(
            vm.execute(&mut []).map_err(|e| e.code()),
            Err(RBPF_OUT_OF_BRANCHES)
        );
    }

    #[test]
    fn preflight_failure_is_cached() {
        let image = ImageBuilder::new().insn(BpfInsn::mov64_imm(0, 1)).build().expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime);
        assert_eq!(vm.execute(&mut []).map_err(|e| e.code()), Err(RBPF_NO_RETURN));
        assert!(!vm.is_verified());

        let mut vm = vm.allow_no_return(true);
        assert_eq!(vm.execute(&mut []), Ok(1));
    }

    #[test]
    fn stack_round_trip() {
        let image = ImageBuilder::new()
            .insn(BpfInsn::mov64_imm(1, 0x1234))
            .insn(BpfInsn::stx(MemSize::DWord, 10, 1, -8))
            .insn(BpfInsn::ldx(MemSize::DWord, 0, 10, -8))
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime);
        assert_eq!(vm.execute(&mut []), Ok(0x1234));
    }

    #[test]
    fn data_section_is_writable_copy() {
        let image = ImageBuilder::new()
            .data(&[1, 0, 0, 0])
            .wide(WideInsn::ld_dw_data(1, 0))
            .insn(BpfInsn::ldx(MemSize::Word, 0, 1, 0))
            .insn(BpfInsn::add64_imm(0, 1))
            .insn(BpfInsn::stx(MemSize::Word, 1, 0, 0))
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let mut vm = Vm::new(program, &runtime);
        assert_eq!(vm.execute(&mut []), Ok(2));
        assert_eq!(vm.execute(&mut []), Ok(3));
        assert_eq!(vm.data(), &3u32.to_ne_bytes());
        assert_eq!(program.data(), &[1, 0, 0, 0]);
    }

    #[test]
    fn extra_region_capacity() {
        let image = ImageBuilder::new().exit().build().expect("image fits");
        let program = Program::parse(&image).expect("valid image");
        let runtime = Runtime::new();
        let buf = [0u8; 4];
        let mut vm = Vm::new(program, &runtime);
        for _ in 0..MAX_REGIONS {
            vm.add_region(Region::read_only(&buf)).unwrap();
        }
        assert_eq!(
            vm.add_region(Region::read_only(&buf)),
            Err(RegionError::TableFull {
                capacity: MAX_REGIONS
            })
        );
        assert_eq!(vm.execute(&mut []), Ok(0));
    }
}
