fn main() -> Result<(), Box<dyn std::error::Error>> {
    mcp_tester::cli::main()
}
