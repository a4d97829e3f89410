use bitflags::bitflags;

bitflags! {
    /// Permission bits of a memory region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionFlags: u8 {
        const READ  = 0x01;
        const WRITE = 0x02;
        const EXEC  = 0x04;
    }
}

bitflags! {
    /// State and configuration word of a VM instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VmFlags: u16 {
        const SETUP_DONE     = 0x0001;
        const PREFLIGHT_DONE = 0x0002;
        /// The program is not required to end with an exit instruction.
        const NO_RETURN      = 0x0100;
    }
}
