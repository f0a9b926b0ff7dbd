pub mod logfile;
pub mod port;
pub mod protocol;
pub mod regs;
pub mod scanner;
pub mod session;
