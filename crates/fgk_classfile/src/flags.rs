use bitflags::bitflags;

bitflags! {
    /// JVM access and property flags.
    ///
    /// The same bit positions are reused between contexts by the class file
    /// format (`0x0020` is `ACC_SUPER` on a class but `ACC_SYNCHRONIZED` on a
    /// method); both names are defined and alias the same bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// Mask covering the three visibility bits.
    pub const VISIBILITY_MASK: u16 = 0x0007;

    /// The visibility bits only, as a raw mask value.
    pub fn visibility(self) -> u16 {
        self.bits() & Self::VISIBILITY_MASK
    }
}
