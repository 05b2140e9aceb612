mod composite;
mod measurements;
mod tool_readings;
